//! Module-wide pass run after every patch has been applied.
//!
//! Two things happen here, once per method:
//!
//! - P/Invoke methods importing from one of the configured native modules are turned
//!   into managed stubs returning the default value of their return type, when the
//!   stub flag is set. This lets a target run where those libraries do not exist.
//! - Operand encodings are made consistent again. Patches insert code freely, so a
//!   short branch may end up more than 127 bytes away from its target and a short
//!   local/argument form may end up with an index above 255. Such instructions are
//!   widened to their long forms, repeating until nothing changes, since every widened
//!   branch can push another one out of range.

use log::{debug, info};

use crate::{
    assembly::{Instruction, OpCode, Operand, OperandKind},
    body::InstructionStream,
    config::PatchConfig,
    flags::FlagEnvironment,
    metadata::{MethodAttributes, MethodDef, MethodImplFlags, Module},
    patcher::PatchReport,
    Result,
};

pub(crate) fn run(
    module: &mut Module,
    flags: &FlagEnvironment,
    config: &PatchConfig,
    report: &mut PatchReport,
) -> Result<()> {
    let stub = flags.is_set(&config.stub_flag);

    for method in module.methods_mut() {
        if stub && is_stub_candidate(method, &config.stub_modules) {
            let id = method.id();
            if let Some(import) = &method.pinvoke {
                info!("Stubbing {} -> {}::{}", id, import.module, import.entry_point);
            }
            stub_extern(method)?;
            report.stubbed.push(id);
        }
        if !config.rewrites_branches() {
            continue;
        }

        let Some(body) = method.body.as_mut() else {
            continue;
        };
        if config.optimize_branches {
            report.shortened += shorten_branches(body)?;
        }
        if config.widen_branches {
            report.widened += widen_branches(body)?;
        }
    }
    Ok(())
}

fn is_stub_candidate(method: &MethodDef, modules: &[String]) -> bool {
    method.body.is_none()
        && method
            .pinvoke
            .as_ref()
            .is_some_and(|import| modules.iter().any(|m| *m == import.module))
}

/// Replaces an extern method by a managed body returning the default value of its
/// return type.
///
/// Void methods get a bare `ret`; everything else gets
/// `ldloca tmp; initobj T; ldloc tmp; ret` with a fresh local `tmp` of type `T`.
/// The P/Invoke import and its related flags are cleared.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the stub cannot be assembled.
pub fn stub_extern(method: &mut MethodDef) -> Result<()> {
    let mut body = InstructionStream::new();
    body.set_owner(method.id());

    let return_type = &method.signature.return_type;
    if !return_type.is_void() {
        let tmp = body.add_local(return_type.clone())?;
        body.push(Instruction::ldloca(tmp))?;
        body.push(Instruction::initobj(return_type.clone()))?;
        body.push(Instruction::ldloc(tmp))?;
    }
    body.push(Instruction::ret())?;

    method.pinvoke = None;
    method.attributes.remove(MethodAttributes::PINVOKE_IMPL);
    method
        .impl_flags
        .remove(MethodImplFlags::PRESERVE_SIG | MethodImplFlags::INTERNAL_CALL);
    method.body = Some(body);
    Ok(())
}

/// Widens every short-form instruction whose operand no longer fits, to a fixpoint.
/// Returns the number of instructions widened.
///
/// # Errors
///
/// Returns [`crate::Error::DanglingBranchTarget`] if a branch targets nothing.
pub fn widen_branches(stream: &mut InstructionStream) -> Result<usize> {
    stream.validate()?;
    let mut widened = 0;

    let macros: Vec<(usize, OpCode)> = stream
        .iter()
        .enumerate()
        .filter(|(_, instr)| needs_long_index(instr))
        .filter_map(|(pos, instr)| instr.opcode().long_form().map(|long| (pos, long)))
        .collect();
    for (pos, long) in macros {
        stream.replace_opcode(pos, long)?;
        widened += 1;
    }

    loop {
        let offsets = stream.byte_offsets();
        let mut out_of_range = Vec::new();
        for (pos, instr) in stream.iter().enumerate() {
            if !instr.opcode().is_short_branch() {
                continue;
            }
            let Some(target) = instr
                .branch_target()
                .and_then(|label| stream.label_position(label))
            else {
                continue;
            };
            let displacement = offsets[target] as i64 - offsets[pos + 1] as i64;
            if i8::try_from(displacement).is_err() {
                if let Some(long) = instr.opcode().long_form() {
                    out_of_range.push((pos, long));
                }
            }
        }

        if out_of_range.is_empty() {
            break;
        }
        for (pos, long) in out_of_range {
            stream.replace_opcode(pos, long)?;
            widened += 1;
        }
    }

    if widened > 0 {
        debug!("{}: widened {} instructions", stream.owner(), widened);
    }
    Ok(widened)
}

/// Rewrites long-form branches whose displacement fits in one byte to their short form.
/// Returns the number of branches shortened.
///
/// Shortening only ever moves code closer together, so a single pass over the current
/// layout is enough.
///
/// # Errors
///
/// Returns [`crate::Error::DanglingBranchTarget`] if a branch targets nothing.
pub fn shorten_branches(stream: &mut InstructionStream) -> Result<usize> {
    stream.validate()?;
    let offsets = stream.byte_offsets();

    let mut candidates = Vec::new();
    for (pos, instr) in stream.iter().enumerate() {
        let opcode = instr.opcode();
        if !opcode.is_branch() || opcode.is_short_branch() {
            continue;
        }
        let (Some(short), Some(target)) = (
            opcode.short_form(),
            instr
                .branch_target()
                .and_then(|label| stream.label_position(label)),
        ) else {
            continue;
        };

        let saved = opcode.encoded_size(0) - short.encoded_size(0);
        let end = offsets[pos + 1] - saved;
        let target_offset = if target > pos {
            offsets[target] - saved
        } else {
            offsets[target]
        };
        if i8::try_from(target_offset as i64 - end as i64).is_ok() {
            candidates.push((pos, short));
        }
    }

    let shortened = candidates.len();
    for (pos, short) in candidates {
        stream.replace_opcode(pos, short)?;
    }
    if shortened > 0 {
        debug!("{}: shortened {} branches", stream.owner(), shortened);
    }
    Ok(shortened)
}

fn needs_long_index(instr: &Instruction) -> bool {
    match (instr.opcode().operand_kind(), instr.operand()) {
        (OperandKind::ShortVariable, Operand::Local(index))
        | (OperandKind::ShortArgument, Operand::Argument(index)) => *index > u16::from(u8::MAX),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::BodyBuilder,
        metadata::{MethodDefBuilder, TypeDefBuilder, TypeRef},
    };

    fn far_branch_body(nops: usize) -> InstructionStream {
        let mut body = BodyBuilder::new();
        body.emit_branch(OpCode::BrtrueS, "end").unwrap();
        for _ in 0..nops {
            body.emit(Instruction::nop()).unwrap();
        }
        body.define_label("end").unwrap().emit(Instruction::ret()).unwrap();
        body.build().unwrap()
    }

    #[test]
    fn test_widen_out_of_range() {
        let mut near = far_branch_body(127);
        assert_eq!(widen_branches(&mut near).unwrap(), 0);
        assert_eq!(near.get(0).map(Instruction::opcode), Some(OpCode::BrtrueS));

        let mut far = far_branch_body(128);
        assert_eq!(widen_branches(&mut far).unwrap(), 1);
        assert_eq!(far.get(0).map(Instruction::opcode), Some(OpCode::Brtrue));
        assert_eq!(far.label_position(far.get(0).unwrap().branch_target().unwrap()), Some(129));
    }

    #[test]
    fn test_widen_cascades() {
        // widening the forward branch pushes the backward one out of range
        let mut body = BodyBuilder::new();
        body.define_label("top")
            .unwrap()
            .emit(Instruction::nop())
            .unwrap()
            .emit_branch(OpCode::BrS, "far")
            .unwrap();
        for _ in 0..122 {
            body.emit(Instruction::nop()).unwrap();
        }
        body.emit_branch(OpCode::BrS, "top").unwrap();
        for _ in 0..10 {
            body.emit(Instruction::nop()).unwrap();
        }
        body.define_label("far").unwrap().emit(Instruction::ret()).unwrap();
        let mut stream = body.build().unwrap();

        assert_eq!(widen_branches(&mut stream).unwrap(), 2);
        assert_eq!(stream.get(1).map(Instruction::opcode), Some(OpCode::Br));
        assert_eq!(stream.get(124).map(Instruction::opcode), Some(OpCode::Br));
    }

    #[test]
    fn test_widen_local_index() {
        let mut stream = InstructionStream::new();
        stream
            .push(Instruction::new(OpCode::LdlocS, Operand::Local(300)).unwrap())
            .unwrap();
        stream.push(Instruction::ldloc(200)).unwrap();
        stream.push(Instruction::ret()).unwrap();

        assert_eq!(widen_branches(&mut stream).unwrap(), 1);
        assert_eq!(stream.get(0).map(Instruction::opcode), Some(OpCode::Ldloc));
        assert_eq!(stream.get(1).map(Instruction::opcode), Some(OpCode::LdlocS));
    }

    #[test]
    fn test_shorten() {
        let mut body = BodyBuilder::new();
        body.emit_branch(OpCode::Brfalse, "end")
            .unwrap()
            .emit(Instruction::nop())
            .unwrap()
            .define_label("end")
            .unwrap()
            .emit(Instruction::ret())
            .unwrap();
        let mut stream = body.build().unwrap();
        assert_eq!(shorten_branches(&mut stream).unwrap(), 1);
        assert_eq!(stream.get(0).map(Instruction::opcode), Some(OpCode::BrfalseS));
        assert_eq!(widen_branches(&mut stream).unwrap(), 0);
    }

    #[test]
    fn test_stub_extern() {
        let mut module = Module::new("Game.exe");
        let native = TypeDefBuilder::new("FMOD.Studio.STUDIO_VCA").build(&mut module).unwrap();
        let get_volume = MethodDefBuilder::new("FMOD_Studio_VCA_GetVolume")
            .returns(TypeRef::new("FMOD.RESULT"))
            .param(TypeRef::new("System.IntPtr"))
            .pinvoke("fmodstudio", "FMOD_Studio_VCA_GetVolume")
            .build(&mut module, native)
            .unwrap();
        let release = MethodDefBuilder::new("FMOD_Release")
            .pinvoke("fmod", "FMOD_Release")
            .build(&mut module, native)
            .unwrap();

        let method = module.method_mut(get_volume).unwrap();
        stub_extern(method).unwrap();
        assert!(!method.is_pinvoke());
        assert!(!method.impl_flags.contains(MethodImplFlags::PRESERVE_SIG));
        let body = method.body.as_ref().unwrap();
        let listing: Vec<String> = body.iter().map(ToString::to_string).collect();
        assert_eq!(
            listing,
            vec!["ldloca.s V_0", "initobj FMOD.RESULT", "ldloc.0", "ret"]
        );
        assert_eq!(body.locals()[0].var_type, TypeRef::new("FMOD.RESULT"));

        let method = module.method_mut(release).unwrap();
        stub_extern(method).unwrap();
        assert_eq!(method.body.as_ref().map(InstructionStream::len), Some(1));
    }
}
