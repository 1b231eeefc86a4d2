//! Bootstrap state machine.
//!
//! [`BootstrapMachine`] holds the transition rules and nothing else: it
//! consumes [`BootstrapEvent`]s and answers with [`Command`]s for the
//! supervisor to execute. It never performs I/O, which keeps every rule
//! testable without a runtime.
//!
//! ```text
//!  Idle ─► CapabilityCheck ─► EngineLoading ─► Creating ─► StyleRequesting ─► StyleLoaded ─► Ready
//!               │                  │              │            │   ▲  (1 retry)     │
//!               │                  │              │            └───┘                │
//!               └──────────────────┴──────────────┴───► Error ─► FallbackActive ◄───┘ runtime error
//!                                                       ▲
//!                                             deadline elapsed (no style yet)
//! ```

use std::fmt;

/// Bootstrap phase of one map instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for a measured surface.
    Idle,
    CapabilityCheck,
    EngineLoading,
    Creating,
    /// Style document requested. `attempt` is 1 for the configured style and
    /// 2 for the secondary one.
    StyleRequesting { attempt: u8 },
    StyleLoaded,
    Ready,
    /// The primary path failed; the fallback renderer is being built.
    Error { reason: String },
    /// Terminal: the raster fallback renderer is active.
    FallbackActive { reason: String },
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::CapabilityCheck => "capability-check",
            EngineState::EngineLoading => "engine-loading",
            EngineState::Creating => "creating",
            EngineState::StyleRequesting { .. } => "style-requesting",
            EngineState::StyleLoaded => "style-loaded",
            EngineState::Ready => "ready",
            EngineState::Error { .. } => "error",
            EngineState::FallbackActive { .. } => "fallback-active",
        }
    }

    /// Whether a renderer is usable: primary ready or fallback active.
    pub fn is_settled(&self) -> bool {
        matches!(self, EngineState::Ready | EngineState::FallbackActive { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::FallbackActive { .. })
    }

    /// States in which the bootstrap deadline applies.
    pub fn awaits_style(&self) -> bool {
        matches!(
            self,
            EngineState::Creating | EngineState::StyleRequesting { .. }
        )
    }

    /// Failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            EngineState::Error { reason } | EngineState::FallbackActive { reason } => {
                Some(reason.as_str())
            }
            _ => None,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} ({})", self.as_str(), reason),
            None => f.write_str(self.as_str()),
        }
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapEvent {
    /// A non-zero surface is available.
    SurfaceMeasured,
    CapabilityAvailable { adapter: String },
    CapabilityMissing(String),
    EngineLoaded,
    EngineLoadFailed(String),
    RendererCreated,
    CreateFailed(String),
    StyleLoaded { attempt: u8 },
    StyleFailed { attempt: u8, reason: String },
    FirstPaint,
    RuntimeError(String),
    /// The one-shot deadline fired. `style_ready` tells whether a style load
    /// completed in the same turn.
    DeadlineElapsed { style_ready: bool },
    /// The fallback renderer has been constructed.
    FallbackReady,
}

/// Side effects requested by the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    DetectCapability,
    LoadEngine,
    StartDeadline,
    CreateRenderer,
    RequestStyle { url: String, attempt: u8 },
    Paint,
    CancelDeadline,
    /// Hand the primary renderer to consumers.
    PublishPrimary,
    /// Release the primary renderer and build the fallback.
    ActivateFallback { reason: String },
}

/// Pure transition logic for one map instance.
#[derive(Debug, Clone)]
pub struct BootstrapMachine {
    state: EngineState,
    primary_style: String,
    secondary_style: String,
    deadline_secs: u64,
    history: Vec<EngineState>,
    fallback_entries: u32,
}

impl BootstrapMachine {
    pub fn new(
        primary_style: impl Into<String>,
        secondary_style: impl Into<String>,
        deadline_secs: u64,
    ) -> Self {
        Self {
            state: EngineState::Idle,
            primary_style: primary_style.into(),
            secondary_style: secondary_style.into(),
            deadline_secs,
            history: vec![EngineState::Idle],
            fallback_entries: 0,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[EngineState] {
        &self.history
    }

    /// How many times `FallbackActive` has been entered. Never exceeds one.
    pub fn fallback_entries(&self) -> u32 {
        self.fallback_entries
    }

    fn enter(&mut self, state: EngineState) {
        self.history.push(state.clone());
        self.state = state;
    }

    fn fail(&mut self, reason: String) -> Vec<Command> {
        self.enter(EngineState::Error {
            reason: reason.clone(),
        });
        vec![Command::CancelDeadline, Command::ActivateFallback { reason }]
    }

    /// Apply one event. Events that do not apply to the current state are
    /// ignored and yield no commands.
    pub fn handle(&mut self, event: BootstrapEvent) -> Vec<Command> {
        use BootstrapEvent as E;
        use EngineState as S;

        let current = self.state.clone();
        match (current, event) {
            (S::FallbackActive { .. }, _) => Vec::new(),

            (S::Error { reason }, E::FallbackReady) => {
                self.fallback_entries += 1;
                self.enter(S::FallbackActive { reason });
                Vec::new()
            }
            (S::Error { .. }, _) => Vec::new(),

            (S::Idle, E::SurfaceMeasured) => {
                self.enter(S::CapabilityCheck);
                vec![Command::DetectCapability]
            }
            (S::Idle, _) => Vec::new(),

            (S::CapabilityCheck, E::CapabilityAvailable { .. }) => {
                self.enter(S::EngineLoading);
                vec![Command::LoadEngine]
            }
            (S::CapabilityCheck, E::CapabilityMissing(reason)) => self.fail(reason),

            (S::EngineLoading, E::EngineLoaded) => {
                self.enter(S::Creating);
                vec![Command::StartDeadline, Command::CreateRenderer]
            }
            (S::EngineLoading, E::EngineLoadFailed(reason)) => self.fail(reason),

            (S::Creating, E::RendererCreated) => {
                self.enter(S::StyleRequesting { attempt: 1 });
                vec![Command::RequestStyle {
                    url: self.primary_style.clone(),
                    attempt: 1,
                }]
            }
            (S::Creating, E::CreateFailed(reason)) => self.fail(reason),

            (S::StyleRequesting { attempt }, E::StyleLoaded { attempt: loaded })
                if attempt == loaded =>
            {
                self.enter(S::StyleLoaded);
                vec![Command::Paint]
            }
            (S::StyleRequesting { attempt: 1 }, E::StyleFailed { attempt: 1, .. }) => {
                self.enter(S::StyleRequesting { attempt: 2 });
                vec![Command::RequestStyle {
                    url: self.secondary_style.clone(),
                    attempt: 2,
                }]
            }
            (S::StyleRequesting { attempt: 2 }, E::StyleFailed { attempt: 2, reason }) => {
                self.fail(format!("style unavailable: {}", reason))
            }

            (S::StyleLoaded, E::FirstPaint) => {
                self.enter(S::Ready);
                vec![Command::CancelDeadline, Command::PublishPrimary]
            }

            (state, E::DeadlineElapsed { style_ready }) if state.awaits_style() => {
                if style_ready {
                    self.enter(S::StyleLoaded);
                    vec![Command::Paint]
                } else {
                    self.fail(format!(
                        "map engine did not become ready within {}s",
                        self.deadline_secs
                    ))
                }
            }

            (_, E::RuntimeError(reason)) => self.fail(reason),

            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> BootstrapMachine {
        BootstrapMachine::new("https://styles/primary.json", "https://styles/secondary.json", 8)
    }

    fn drive_to_style_request(machine: &mut BootstrapMachine) {
        machine.handle(BootstrapEvent::SurfaceMeasured);
        machine.handle(BootstrapEvent::CapabilityAvailable {
            adapter: "test".to_string(),
        });
        machine.handle(BootstrapEvent::EngineLoaded);
        machine.handle(BootstrapEvent::RendererCreated);
    }

    #[test]
    fn test_happy_path_reaches_ready() {
        let mut m = machine();
        assert_eq!(
            m.handle(BootstrapEvent::SurfaceMeasured),
            vec![Command::DetectCapability]
        );
        m.handle(BootstrapEvent::CapabilityAvailable {
            adapter: "gpu".to_string(),
        });
        assert_eq!(
            m.handle(BootstrapEvent::EngineLoaded),
            vec![Command::StartDeadline, Command::CreateRenderer]
        );
        assert_eq!(
            m.handle(BootstrapEvent::RendererCreated),
            vec![Command::RequestStyle {
                url: "https://styles/primary.json".to_string(),
                attempt: 1
            }]
        );
        assert_eq!(
            m.handle(BootstrapEvent::StyleLoaded { attempt: 1 }),
            vec![Command::Paint]
        );
        assert_eq!(
            m.handle(BootstrapEvent::FirstPaint),
            vec![Command::CancelDeadline, Command::PublishPrimary]
        );
        assert_eq!(m.state(), &EngineState::Ready);
        assert_eq!(m.history().len(), 7);
        assert_eq!(m.fallback_entries(), 0);
    }

    #[test]
    fn test_idle_ignores_everything_but_surface() {
        let mut m = machine();
        assert!(m.handle(BootstrapEvent::EngineLoaded).is_empty());
        assert!(m
            .handle(BootstrapEvent::DeadlineElapsed { style_ready: false })
            .is_empty());
        assert_eq!(m.state(), &EngineState::Idle);
    }

    #[test]
    fn test_missing_capability_never_loads_engine() {
        let mut m = machine();
        m.handle(BootstrapEvent::SurfaceMeasured);
        let commands = m.handle(BootstrapEvent::CapabilityMissing("no adapter".to_string()));
        assert_eq!(
            commands,
            vec![
                Command::CancelDeadline,
                Command::ActivateFallback {
                    reason: "no adapter".to_string()
                }
            ]
        );
        m.handle(BootstrapEvent::FallbackReady);

        assert_eq!(
            m.state(),
            &EngineState::FallbackActive {
                reason: "no adapter".to_string()
            }
        );
        assert!(!m.history().contains(&EngineState::EngineLoading));
        assert!(m.history().contains(&EngineState::Error {
            reason: "no adapter".to_string()
        }));
    }

    #[test]
    fn test_first_style_failure_retries_with_secondary() {
        let mut m = machine();
        drive_to_style_request(&mut m);
        let commands = m.handle(BootstrapEvent::StyleFailed {
            attempt: 1,
            reason: "HTTP 404".to_string(),
        });
        assert_eq!(
            commands,
            vec![Command::RequestStyle {
                url: "https://styles/secondary.json".to_string(),
                attempt: 2
            }]
        );
        assert_eq!(m.state(), &EngineState::StyleRequesting { attempt: 2 });

        // A late success for the first attempt does not count.
        assert!(m
            .handle(BootstrapEvent::StyleLoaded { attempt: 1 })
            .is_empty());

        m.handle(BootstrapEvent::StyleLoaded { attempt: 2 });
        assert_eq!(m.state(), &EngineState::StyleLoaded);
    }

    #[test]
    fn test_second_style_failure_falls_back() {
        let mut m = machine();
        drive_to_style_request(&mut m);
        m.handle(BootstrapEvent::StyleFailed {
            attempt: 1,
            reason: "HTTP 404".to_string(),
        });
        let commands = m.handle(BootstrapEvent::StyleFailed {
            attempt: 2,
            reason: "HTTP 500".to_string(),
        });
        assert!(matches!(
            commands.last(),
            Some(Command::ActivateFallback { reason }) if reason == "style unavailable: HTTP 500"
        ));
    }

    #[test]
    fn test_deadline_without_style_falls_back_once() {
        let mut m = machine();
        drive_to_style_request(&mut m);
        m.handle(BootstrapEvent::DeadlineElapsed { style_ready: false });
        m.handle(BootstrapEvent::FallbackReady);

        assert!(m.state().is_terminal());
        assert_eq!(
            m.state().reason(),
            Some("map engine did not become ready within 8s")
        );

        // Nothing moves the machine out of the terminal state.
        assert!(m.handle(BootstrapEvent::StyleLoaded { attempt: 1 }).is_empty());
        assert!(m.handle(BootstrapEvent::RuntimeError("x".to_string())).is_empty());
        assert!(m
            .handle(BootstrapEvent::DeadlineElapsed { style_ready: false })
            .is_empty());
        assert!(m.handle(BootstrapEvent::FallbackReady).is_empty());
        assert_eq!(m.fallback_entries(), 1);
    }

    #[test]
    fn test_deadline_with_style_ready_promotes() {
        let mut m = machine();
        drive_to_style_request(&mut m);
        let commands = m.handle(BootstrapEvent::DeadlineElapsed { style_ready: true });
        assert_eq!(commands, vec![Command::Paint]);
        assert_eq!(m.state(), &EngineState::StyleLoaded);

        m.handle(BootstrapEvent::FirstPaint);
        assert_eq!(m.state(), &EngineState::Ready);
        assert_eq!(m.fallback_entries(), 0);
    }

    #[test]
    fn test_deadline_after_style_loaded_is_ignored() {
        let mut m = machine();
        drive_to_style_request(&mut m);
        m.handle(BootstrapEvent::StyleLoaded { attempt: 1 });
        assert!(m
            .handle(BootstrapEvent::DeadlineElapsed { style_ready: false })
            .is_empty());
        assert_eq!(m.state(), &EngineState::StyleLoaded);
    }

    #[test]
    fn test_runtime_error_after_ready_falls_back() {
        let mut m = machine();
        drive_to_style_request(&mut m);
        m.handle(BootstrapEvent::StyleLoaded { attempt: 1 });
        m.handle(BootstrapEvent::FirstPaint);
        let commands = m.handle(BootstrapEvent::RuntimeError("context lost".to_string()));
        assert!(commands.contains(&Command::ActivateFallback {
            reason: "context lost".to_string()
        }));
    }

    #[test]
    fn test_display() {
        assert_eq!(EngineState::Ready.to_string(), "ready");
        assert_eq!(
            EngineState::FallbackActive {
                reason: "timeout".to_string()
            }
            .to_string(),
            "fallback-active (timeout)"
        );
    }
}
