//! Shared fixtures for the integration tests.
//!
//! The fixture module mimics a small game: a version constant built in the constructor
//! of the main type, a player with a coroutine, and a handful of native audio imports.

#![allow(dead_code)]

use cilpatch::{
    patcher::ITERATOR_INTERFACE,
    prelude::*,
    Result,
};

/// Routes `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Tokens of the interesting definitions in [`game_module`].
pub struct Game {
    pub module: Module,
    pub engine_ctor: Token,
    pub player_update: Token,
    pub player_routine: Token,
    pub routine_move_next: Token,
    pub audio_update: Token,
    pub audio_volume: Token,
}

pub fn version_ctor(components: usize) -> MethodRef {
    MethodRef::new(
        TypeRef::new("System.Version"),
        ".ctor",
        cilpatch::metadata::MethodSig::instance(TypeRef::void(), vec![TypeRef::int32(); components]),
    )
}

/// Body of `Game.Engine::.ctor`, storing `new Version(parts...)` into a static field.
fn engine_ctor_body(version: &[i32]) -> Result<InstructionStream> {
    let mut body = BodyBuilder::new();
    body.emit(Instruction::ldarg(0))?;
    for part in version {
        body.emit(Instruction::ldc_i4(*part))?;
    }
    body.emit(Instruction::newobj(version_ctor(version.len())))?
        .emit(Instruction::stsfld(FieldRef::new(
            TypeRef::new("Game.Engine"),
            "Version",
            TypeRef::new("System.Version"),
        )))?
        .emit(Instruction::ret())?;
    body.build()
}

/// `Game.Player::Update()`:
///
/// ```text
///     ldarg.0
///     ldfld    Game.Player::Dashes
///     ldc.i4.1
///     blt.s    done
///     ldarg.0
///     ldc.i4.3
///     stfld    Game.Player::Dashes
/// done:
///     ret
/// ```
fn player_update_body() -> Result<InstructionStream> {
    let dashes = FieldRef::new(TypeRef::new("Game.Player"), "Dashes", TypeRef::int32());
    let mut body = BodyBuilder::new();
    body.emit(Instruction::ldarg(0))?
        .emit(Instruction::ldfld(dashes.clone()))?
        .emit(Instruction::ldc_i4(1))?
        .emit_branch(OpCode::BltS, "done")?
        .emit(Instruction::ldarg(0))?
        .emit(Instruction::ldc_i4(3))?
        .emit(Instruction::stfld(dashes))?
        .define_label("done")?
        .emit(Instruction::ret())?;
    body.build()
}

/// `<DashRoutine>d__42::MoveNext()`: yields `0.5f` once.
fn move_next_body() -> Result<InstructionStream> {
    let mut body = BodyBuilder::new();
    body.emit(Instruction::ldarg(0))?
        .emit(Instruction::ldc_r4(0.5))?
        .emit(Instruction::pop())?
        .emit(Instruction::pop())?
        .emit(Instruction::ldc_bool(true))?
        .emit(Instruction::ret())?;
    body.build()
}

/// Builds the fixture module with the given version constant and per-method annotations.
pub fn game_module(version: &[i32], annotations: &[(&str, PatchAnnotation)]) -> Result<Game> {
    let mut module = Module::new("Game.exe");
    module.add_assembly_ref("mscorlib", Some(BuildVersion::new(4, 0, 0, 0)));
    module.add_assembly_ref("FNA", None);

    let engine = TypeDefBuilder::new("Game.Engine")
        .static_field("Version", TypeRef::new("System.Version"))
        .build(&mut module)?;
    let player = TypeDefBuilder::new("Game.Player")
        .field("Dashes", TypeRef::int32())
        .build(&mut module)?;
    let audio = TypeDefBuilder::new("FMOD.Studio.System").build(&mut module)?;

    let annotated = |method: &'static str| {
        annotations
            .iter()
            .filter(move |(target, _)| *target == method)
            .map(|(_, annotation)| annotation.clone())
    };

    let mut engine_builder = MethodDefBuilder::new(".ctor").body(engine_ctor_body(version)?);
    for annotation in annotated(".ctor") {
        engine_builder = engine_builder.annotate(annotation);
    }
    let engine_ctor = engine_builder.build(&mut module, engine)?;

    let mut update_builder = MethodDefBuilder::new("Update").body(player_update_body()?);
    for annotation in annotated("Update") {
        update_builder = update_builder.annotate(annotation);
    }
    let player_update = update_builder.build(&mut module, player)?;

    let mut routine_builder =
        MethodDefBuilder::new("DashRoutine").returns(TypeRef::new("System.Collections.IEnumerator"));
    for annotation in annotated("DashRoutine") {
        routine_builder = routine_builder.annotate(annotation);
    }
    let player_routine = routine_builder.build(&mut module, player)?;

    let machine = TypeDefBuilder::new("<DashRoutine>d__42")
        .nested_in(player)
        .implements(ITERATOR_INTERFACE)
        .field("<>2__current", TypeRef::object())
        .build(&mut module)?;
    let routine_move_next = MethodDefBuilder::new("MoveNext")
        .returns(TypeRef::boolean())
        .body(move_next_body()?)
        .build(&mut module, machine)?;

    let audio_update = MethodDefBuilder::new("FMOD_Studio_System_Update")
        .static_method()
        .returns(TypeRef::new("FMOD.RESULT"))
        .param(TypeRef::new("System.IntPtr"))
        .pinvoke("fmodstudio", "FMOD_Studio_System_Update")
        .build(&mut module, audio)?;
    let audio_volume = MethodDefBuilder::new("FMOD_System_SetVolume")
        .static_method()
        .param(TypeRef::new("System.Single"))
        .pinvoke("fmod", "FMOD_System_SetVolume")
        .build(&mut module, audio)?;
    MethodDefBuilder::new("GetTickCount")
        .static_method()
        .returns(TypeRef::new("System.UInt32"))
        .pinvoke("kernel32", "GetTickCount")
        .build(&mut module, audio)?;

    Ok(Game {
        module,
        engine_ctor,
        player_update,
        player_routine,
        routine_move_next,
        audio_update,
        audio_volume,
    })
}

/// Version gate reading the constant of [`game_module`].
pub fn gated_config(minimum: BuildVersion) -> PatchConfig {
    PatchConfig::default()
        .with_minimum_version(minimum, VersionSource::constructor_of("Game.Engine"))
}

/// Instruction listing of a method body, one mnemonic line per instruction.
pub fn listing(module: &Module, method: Token) -> Vec<String> {
    module
        .method(method)
        .and_then(|m| m.body.as_ref())
        .map(|body| body.iter().map(ToString::to_string).collect())
        .unwrap_or_default()
}
