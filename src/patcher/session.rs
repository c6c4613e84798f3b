use log::{debug, info, warn};
use strum::{Display, EnumCount, EnumIter};

use crate::{
    config::PatchConfig,
    flags::{resolve_flags, FlagEnvironment},
    metadata::{Module, Token, TypeDefBuilder},
    patcher::{
        context::LookupCache, descriptor::schedule, postprocess, AppliedPatch, BodyResolver,
        PatchContext, PatchDescriptor, PatchRegistry, PatchReport, PatchRoutine, SkippedPatch,
    },
    Error, Result,
};

/// Lifecycle of a [`PatchSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum SessionPhase {
    /// Created, not run yet
    Idle,
    /// Collecting annotations into descriptors
    Scanning,
    /// Mapping annotated methods to the bodies routines edit
    Resolving,
    /// Applying immediate patches in scan order
    ApplyingImmediate,
    /// Applying deferred patches in registration order
    ApplyingDeferred,
    /// Stubbing externs and fixing operand encodings
    PostProcessing,
    /// Finished, the module has been committed
    Done,
    /// Aborted, the module is untouched
    Failed,
}

/// One run of the patch catalogue over one module.
///
/// A session is all-or-nothing: it works on a copy of the module and only replaces
/// the caller's module once every patch has been applied, validated and
/// post-processed. Any error leaves the caller's module exactly as it was.
///
/// # Examples
///
/// ```rust
/// use cilpatch::prelude::*;
///
/// let mut module = Module::new("Game.exe");
/// let game = TypeDefBuilder::new("Game.Game").build(&mut module)?;
/// let mut body = BodyBuilder::new();
/// body.emit(Instruction::ldc_bool(false))?.emit(Instruction::ret())?;
/// MethodDefBuilder::new("get_IsDebug")
///     .returns(TypeRef::boolean())
///     .body(body.build()?)
///     .annotate(PatchAnnotation::new("ForceDebug"))
///     .build(&mut module, game)?;
///
/// let mut registry = PatchRegistry::new();
/// registry.register_fn("ForceDebug", |ctx, target| {
///     ctx.edit(target, |editor| {
///         let mut cursor = editor.cursor();
///         cursor.goto_next(MoveType::Before, Predicate::int(0))?;
///         cursor.replace(Instruction::ldc_bool(true))?;
///         Ok(())
///     })
/// })?;
///
/// let mut session = PatchSession::new(&registry, PatchConfig::default());
/// let report = session.run(&mut module)?;
/// assert!(report.was_applied("ForceDebug"));
/// assert_eq!(session.phase(), SessionPhase::Done);
///
/// // The marker refuses a second run
/// let again = PatchSession::new(&registry, PatchConfig::default()).run(&mut module);
/// assert!(matches!(again, Err(Error::AlreadyPatched { .. })));
/// # Ok::<(), cilpatch::Error>(())
/// ```
pub struct PatchSession<'r> {
    registry: &'r PatchRegistry,
    config: PatchConfig,
    phase: SessionPhase,
    flags: Option<FlagEnvironment>,
}

impl<'r> PatchSession<'r> {
    /// Creates an idle session.
    #[must_use]
    pub fn new(registry: &'r PatchRegistry, config: PatchConfig) -> Self {
        PatchSession {
            registry,
            config,
            phase: SessionPhase::Idle,
            flags: None,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Returns the flag environment, once it has been computed.
    #[must_use]
    pub fn flags(&self) -> Option<&FlagEnvironment> {
        self.flags.as_ref()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Applies every annotated patch to `module`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::AlreadyPatched`] if the module carries the marker type
    /// - [`crate::Error::UnsupportedTarget`] if the target version is too old
    /// - [`crate::Error::UnknownRoutine`] for an annotation naming no routine
    /// - [`crate::Error::PatchFailed`] for any failure while resolving or applying a patch
    ///
    /// On error the module is left untouched and the session ends in
    /// [`SessionPhase::Failed`].
    pub fn run(&mut self, module: &mut Module) -> Result<PatchReport> {
        if self.phase != SessionPhase::Idle {
            return Err(malformed_error!(
                "Patch session already ran ({})",
                self.phase
            ));
        }

        match self.execute(module) {
            Ok(report) => {
                self.enter(SessionPhase::Done);
                info!("Patched {}: {}", module.name, report.summary());
                Ok(report)
            }
            Err(e) => {
                self.enter(SessionPhase::Failed);
                warn!("Patching {} failed: {}", module.name, e);
                Err(e)
            }
        }
    }

    fn execute(&mut self, module: &mut Module) -> Result<PatchReport> {
        if module.find_type(&self.config.marker_type).is_some() {
            return Err(Error::AlreadyPatched {
                marker: self.config.marker_type.clone(),
            });
        }
        let flags = resolve_flags(module, &self.config)?;
        let flags = self.flags.insert(flags).clone();

        let mut work = module.clone();
        let mut report = PatchReport::new(flags.version());

        self.enter(SessionPhase::Scanning);
        let descriptors = self.scan(&work, &flags, &mut report)?;

        self.enter(SessionPhase::Resolving);
        let descriptors = self.resolve(&work, descriptors)?;
        let (immediate, deferred) = schedule(descriptors);

        let mut cache = LookupCache::default();
        self.enter(SessionPhase::ApplyingImmediate);
        for descriptor in &immediate {
            self.apply(&mut work, &flags, &mut cache, descriptor, &mut report)?;
        }

        self.enter(SessionPhase::ApplyingDeferred);
        for descriptor in &deferred {
            self.apply(&mut work, &flags, &mut cache, descriptor, &mut report)?;
        }

        self.enter(SessionPhase::PostProcessing);
        postprocess::run(&mut work, &flags, &self.config, &mut report)?;
        if self.config.stamp_marker {
            TypeDefBuilder::new(self.config.marker_type.as_str()).build(&mut work)?;
        }

        *module = work;
        Ok(report)
    }

    fn enter(&mut self, phase: SessionPhase) {
        debug!("Session phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn scan(
        &self,
        module: &Module,
        flags: &FlagEnvironment,
        report: &mut PatchReport,
    ) -> Result<Vec<PatchDescriptor>> {
        let mut descriptors = Vec::new();
        for method in module.methods() {
            for annotation in &method.annotations {
                if let Some(condition) = &annotation.condition {
                    if !flags.evaluate(condition) {
                        debug!(
                            "Skipping {} on {} (flag {})",
                            annotation.routine,
                            method.id(),
                            condition.flag
                        );
                        report.skipped.push(SkippedPatch {
                            routine: annotation.routine.clone(),
                            method: method.id(),
                            flag: condition.flag.clone(),
                        });
                        continue;
                    }
                }

                let (index, routine) = self
                    .registry
                    .get(&annotation.routine)
                    .ok_or_else(|| Error::UnknownRoutine(annotation.routine.clone()))?;
                let scan_index = descriptors.len();
                descriptors.push(PatchDescriptor::new(
                    method.token,
                    index,
                    routine.ordering(),
                    scan_index,
                ));
            }
        }
        debug!("Scanned {} patch descriptors", descriptors.len());
        Ok(descriptors)
    }

    fn resolve(
        &self,
        module: &Module,
        descriptors: Vec<PatchDescriptor>,
    ) -> Result<Vec<PatchDescriptor>> {
        let mut resolver = BodyResolver::new();
        descriptors
            .into_iter()
            .map(|mut descriptor| {
                let routine = self.routine(descriptor.routine)?;
                descriptor.target = resolver
                    .resolve(module, descriptor.annotated, routine.shape())
                    .map_err(|e| e.in_patch(routine.name(), &method_id(module, descriptor.annotated)))?;
                Ok(descriptor)
            })
            .collect()
    }

    fn apply(
        &self,
        module: &mut Module,
        flags: &FlagEnvironment,
        cache: &mut LookupCache,
        descriptor: &PatchDescriptor,
        report: &mut PatchReport,
    ) -> Result<()> {
        let routine = self.routine(descriptor.routine)?;
        let annotated = method_id(module, descriptor.annotated);
        let target = method_id(module, descriptor.target);
        debug!("Applying {} to {}", routine.name(), target);

        let mut ctx = PatchContext::new(
            module,
            flags,
            &self.config,
            cache,
            routine.name(),
            descriptor.annotated,
            descriptor.target,
        );
        routine
            .apply(&mut ctx, descriptor.target)
            .map_err(|e| e.in_patch(routine.name(), &target))?;

        for token in ctx.into_touched() {
            if let Some(body) = module.method(token).and_then(|m| m.body.as_ref()) {
                body.validate()
                    .map_err(|e| e.in_patch(routine.name(), &target))?;
            }
        }

        report.applied.push(AppliedPatch {
            routine: routine.name().to_string(),
            annotated,
            target: descriptor.target,
        });
        Ok(())
    }

    fn routine(&self, index: usize) -> Result<&'r dyn PatchRoutine> {
        self.registry
            .routine(index)
            .ok_or_else(|| malformed_error!("Routine #{} is not registered", index))
    }
}

fn method_id(module: &Module, token: Token) -> String {
    module
        .method(token)
        .map_or_else(|| token.to_string(), |m| m.id())
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        assembly::Instruction,
        body::BodyBuilder,
        cursor::MoveType,
        metadata::{MethodDefBuilder, PatchAnnotation, TypeRef},
        patcher::{FnRoutine, PatchOrdering},
        pattern::Predicate,
    };

    fn ret_body() -> crate::body::InstructionStream {
        let mut body = BodyBuilder::new();
        body.emit(Instruction::ret()).unwrap();
        body.build().unwrap()
    }

    fn module(annotations: &[(&str, PatchAnnotation)]) -> Module {
        let mut module = Module::new("Game.exe");
        let game = TypeDefBuilder::new("Game.Game").build(&mut module).unwrap();
        for (name, annotation) in annotations {
            MethodDefBuilder::new(*name)
                .body(ret_body())
                .annotate(annotation.clone())
                .build(&mut module, game)
                .unwrap();
        }
        module
    }

    #[test]
    fn test_phases() {
        assert_eq!(SessionPhase::COUNT, 8);
        let names: Vec<String> = SessionPhase::iter().map(|p| p.to_string()).collect();
        assert_eq!(names[0], "Idle");
        assert_eq!(names[7], "Failed");
    }

    #[test]
    fn test_ordering() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = PatchRegistry::new();
        for (name, ordering) in [
            ("Late", PatchOrdering::Deferred),
            ("Early", PatchOrdering::Immediate),
            ("Later", PatchOrdering::Deferred),
        ] {
            let log = Rc::clone(&log);
            registry
                .register(
                    FnRoutine::new(name, move |ctx: &mut PatchContext<'_>, _| {
                        let method = ctx.method(ctx.target())?.name.clone();
                        log.borrow_mut().push(format!("{name}:{method}"));
                        Ok(())
                    })
                    .with_ordering(ordering),
                )
                .unwrap();
        }

        let mut module = module(&[
            ("A", PatchAnnotation::new("Later")),
            ("B", PatchAnnotation::new("Late")),
            ("C", PatchAnnotation::new("Early")),
            ("D", PatchAnnotation::new("Late")),
        ]);
        let report = PatchSession::new(&registry, PatchConfig::default())
            .run(&mut module)
            .unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["Early:C", "Late:B", "Late:D", "Later:A"]
        );
        assert_eq!(report.applied.len(), 4);
    }

    #[test]
    fn test_flag_gate_and_unknown_routine() {
        let mut registry = PatchRegistry::new();
        registry
            .register_fn("NeverOnFNA", |_, _| {
                Err(malformed_error!("gated routine ran"))
            })
            .unwrap();

        let mut module = module(&[("A", PatchAnnotation::new("NeverOnFNA").unless("FNA"))]);
        let config = PatchConfig::default().with_flag("FNA", true);
        let report = PatchSession::new(&registry, config).run(&mut module).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].flag, "FNA");

        let mut module = module_with_unknown();
        let mut session = PatchSession::new(&registry, PatchConfig::default());
        assert!(matches!(
            session.run(&mut module),
            Err(Error::UnknownRoutine(name)) if name == "Missing"
        ));
        assert_eq!(session.phase(), SessionPhase::Failed);
    }

    fn module_with_unknown() -> Module {
        module(&[("A", PatchAnnotation::new("Missing"))])
    }

    #[test]
    fn test_failure_is_transactional() {
        let mut registry = PatchRegistry::new();
        registry
            .register_fn("Edit", |ctx, target| {
                ctx.edit(target, |editor| {
                    editor.cursor().emit(Instruction::nop())?;
                    Ok(())
                })
            })
            .unwrap();
        registry
            .register(
                FnRoutine::new("Fail", |ctx: &mut PatchContext<'_>, target| {
                    ctx.edit(target, |editor| {
                        editor
                            .cursor()
                            .goto_next(MoveType::Before, Predicate::ldstr("missing"))
                    })
                })
                .with_ordering(PatchOrdering::Deferred),
            )
            .unwrap();

        let mut module = module(&[
            ("A", PatchAnnotation::new("Edit")),
            ("B", PatchAnnotation::new("Fail")),
        ]);
        let mut session = PatchSession::new(&registry, PatchConfig::default());
        match session.run(&mut module) {
            Err(Error::PatchFailed {
                routine,
                method,
                source,
            }) => {
                assert_eq!(routine, "Fail");
                assert_eq!(method, "System.Void Game.Game::B()");
                assert!(matches!(*source, Error::PatternNotFound { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }

        let a = module.find_method("Game.Game", "A").unwrap();
        assert_eq!(a.body.as_ref().map(|b| b.len()), Some(1));
        assert!(module.find_type("CilPatch.WasHere").is_none());
    }

    #[test]
    fn test_dangling_edit_rejected() {
        let mut registry = PatchRegistry::new();
        registry
            .register_fn("Dangle", |ctx, target| {
                ctx.edit(target, |editor| {
                    let mut cursor = editor.cursor();
                    let label = cursor.mark_label();
                    cursor.goto_start();
                    cursor.emit_branch(crate::assembly::OpCode::Br, label)?;
                    Ok(())
                })
            })
            .unwrap();
        let mut module = Module::new("Game.exe");
        let game = TypeDefBuilder::new("Game.Game").build(&mut module).unwrap();
        MethodDefBuilder::new("Empty")
            .body(crate::body::InstructionStream::new())
            .annotate(PatchAnnotation::new("Dangle"))
            .build(&mut module, game)
            .unwrap();

        let err = PatchSession::new(&registry, PatchConfig::default())
            .run(&mut module)
            .unwrap_err();
        assert!(matches!(err.root(), Error::DanglingBranchTarget { .. }));
    }

    #[test]
    fn test_session_runs_once() {
        let registry = PatchRegistry::new();
        let mut module = Module::new("Game.exe");
        let mut session = PatchSession::new(&registry, PatchConfig::default());
        session.run(&mut module).unwrap();
        assert!(session.flags().is_some());
        assert!(matches!(
            session.run(&mut Module::new("Other.exe")),
            Err(Error::Malformed { .. })
        ));
        assert!(module.find_type("CilPatch.WasHere").is_some());
        assert_eq!(
            module.find_type("CilPatch.WasHere").map(|t| t.to_ref()),
            Some(TypeRef::new("CilPatch.WasHere"))
        );
    }
}
