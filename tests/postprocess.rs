//! Post-processing as seen through a full session: extern stubbing and branch widening.

mod common;

use cilpatch::{prelude::*, Result};
use common::{game_module, init_logging, listing};

#[test]
fn test_headless_stubs_configured_modules_only() -> Result<()> {
    init_logging();
    let mut game = game_module(&[1, 4, 0, 0], &[])?;
    let registry = PatchRegistry::new();

    let report = PatchSession::new(&registry, PatchConfig::headless(["fmod", "fmodstudio"]))
        .run(&mut game.module)?;

    assert_eq!(report.stubbed.len(), 2);
    assert_eq!(
        listing(&game.module, game.audio_update),
        vec!["ldloca.s V_0", "initobj FMOD.RESULT", "ldloc.0", "ret"]
    );
    assert_eq!(listing(&game.module, game.audio_volume), vec!["ret"]);
    for token in [game.audio_update, game.audio_volume] {
        let method = game.module.method(token).unwrap();
        assert!(!method.is_pinvoke());
        assert!(method.pinvoke.is_none());
    }

    let kernel = game
        .module
        .find_method("FMOD.Studio.System", "GetTickCount")
        .unwrap();
    assert!(kernel.is_pinvoke());
    assert!(kernel.body.is_none());
    Ok(())
}

#[test]
fn test_explicit_flag_overrides_stub_setting() -> Result<()> {
    init_logging();
    let registry = PatchRegistry::new();

    let mut game = game_module(&[1, 4, 0, 0], &[])?;
    let config = PatchConfig::headless(["fmod", "fmodstudio"]).with_flag("StubExterns", false);
    let report = PatchSession::new(&registry, config).run(&mut game.module)?;
    assert!(report.stubbed.is_empty());
    assert!(game.module.method(game.audio_update).unwrap().is_pinvoke());

    let mut game = game_module(&[1, 4, 0, 0], &[])?;
    let mut config = PatchConfig::default().with_flag("StubExterns", true);
    config.stub_modules.push("fmod".to_string());
    let report = PatchSession::new(&registry, config).run(&mut game.module)?;
    assert_eq!(report.stubbed.len(), 1);
    assert!(report.stubbed[0].contains("FMOD_System_SetVolume"));
    Ok(())
}

#[test]
fn test_long_insertion_widens_branch() -> Result<()> {
    init_logging();
    let mut game = game_module(&[1, 4, 0, 0], &[("Update", PatchAnnotation::new("Trace"))])?;

    let mut registry = PatchRegistry::new();
    registry.register_fn("Trace", |ctx, target| {
        ctx.edit(target, |editor| {
            let mut cursor = editor.cursor();
            cursor.goto_next(MoveType::After, Predicate::op(OpCode::BltS))?;
            for _ in 0..130 {
                cursor.emit(Instruction::nop())?;
            }
            Ok(())
        })
    })?;

    let report = PatchSession::new(&registry, PatchConfig::default()).run(&mut game.module)?;
    assert_eq!(report.widened, 1);

    let method = game.module.method(game.player_update).unwrap();
    let body = method.body.as_ref().unwrap();
    assert_eq!(body.len(), 138);
    assert_eq!(body.get(3).map(Instruction::opcode), Some(OpCode::Blt));
    let target = body.get(3).and_then(Instruction::branch_target).unwrap();
    assert_eq!(body.label_position(target), Some(137));
    Ok(())
}

#[test]
fn test_widening_can_be_turned_off() -> Result<()> {
    init_logging();
    let mut game = game_module(&[1, 4, 0, 0], &[("Update", PatchAnnotation::new("Trace"))])?;

    let mut registry = PatchRegistry::new();
    registry.register_fn("Trace", |ctx, target| {
        ctx.edit(target, |editor| {
            let mut cursor = editor.cursor_at(4)?;
            cursor.emit_all(std::iter::repeat_with(Instruction::nop).take(130))
        })
    })?;

    let mut config = PatchConfig::default();
    config.widen_branches = false;
    let report = PatchSession::new(&registry, config).run(&mut game.module)?;
    assert_eq!(report.widened, 0);
    let body = game.module.method(game.player_update).unwrap().body.as_ref().unwrap();
    assert_eq!(body.get(3).map(Instruction::opcode), Some(OpCode::BltS));
    Ok(())
}
