//! RTE Kernel: content-facing function surface.
//!
//! Enforces the session state machine and the error taxonomy:
//!
//!   NotInitialized --Initialize--> Running --Terminate--> Terminated
//!
//! Every call except the three error lookups resets the current error
//! first and sets exactly one code on failure. Nothing here panics on
//! content input; results are the string sentinels content expects.
//!
//! `lms_*` methods speak the legacy dialect, the unprefixed methods the
//! current one. Both operate on the same store.

use tracing::trace;

use crate::dialect::{CanonicalKey, Dialect, DialectAdapter};
use crate::domain::{Element, SessionState};
use crate::error_code::ErrorCode;
use crate::store::DataModelStore;

pub const TRUE: &str = "true";
pub const FALSE: &str = "false";

/// Why a commit happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOrigin {
    /// Content called Commit.
    Content,
    /// The controller's periodic schedule.
    Schedule,
}

/// Notifications delivered to the attached observer, with store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Initialized,
    ValueSet(Element),
    Committed(CommitOrigin),
    /// Sent before the state becomes `Terminated`.
    Terminating { by_host: bool },
}

/// Seam through which the session controller attaches policy and
/// persistence. Runs inside the call that caused the event.
pub trait SurfaceObserver: Send {
    fn on_event(&mut self, event: SurfaceEvent, store: &mut DataModelStore, dialect: Dialect);
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl SurfaceObserver for NoopObserver {
    fn on_event(&mut self, _: SurfaceEvent, _: &mut DataModelStore, _: Dialect) {}
}

/// One content launch's API object.
pub struct RteSurface {
    state: SessionState,
    session_dialect: Dialect,
    store: DataModelStore,
    last_error: ErrorCode,
    diagnostic: String,
    observer: Box<dyn SurfaceObserver>,
}

impl RteSurface {
    pub fn new(store: DataModelStore, observer: Box<dyn SurfaceObserver>) -> Self {
        Self {
            state: SessionState::NotInitialized,
            session_dialect: Dialect::Current,
            store,
            last_error: ErrorCode::NoError,
            diagnostic: String::new(),
            observer,
        }
    }

    /// Surface without an observer, for tests and conformance runs.
    pub fn standalone(store: DataModelStore) -> Self {
        Self::new(store, Box::new(NoopObserver))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Dialect of the Initialize call (current until initialized).
    pub fn session_dialect(&self) -> Dialect {
        self.session_dialect
    }

    pub fn store(&self) -> &DataModelStore {
        &self.store
    }

    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    // ── Current dialect ────────────────────────────────────────────

    pub fn initialize(&mut self, arg: &str) -> &'static str {
        self.initialize_in(Dialect::Current, arg)
    }

    pub fn terminate(&mut self, arg: &str) -> &'static str {
        self.terminate_in(Dialect::Current, arg)
    }

    pub fn get_value(&mut self, element: &str) -> String {
        self.get_value_in(Dialect::Current, element)
    }

    pub fn set_value(&mut self, element: &str, value: &str) -> &'static str {
        self.set_value_in(Dialect::Current, element, value)
    }

    pub fn commit(&mut self, arg: &str) -> &'static str {
        self.commit_in(Dialect::Current, arg)
    }

    pub fn get_last_error(&self) -> String {
        self.last_error_in(Dialect::Current)
    }

    pub fn get_error_string(&self, code: &str) -> String {
        self.error_string_in(Dialect::Current, code)
    }

    pub fn get_diagnostic(&self, code: &str) -> String {
        self.diagnostic_in(Dialect::Current, code)
    }

    // ── Legacy dialect ─────────────────────────────────────────────

    pub fn lms_initialize(&mut self, arg: &str) -> &'static str {
        self.initialize_in(Dialect::Legacy, arg)
    }

    pub fn lms_finish(&mut self, arg: &str) -> &'static str {
        self.terminate_in(Dialect::Legacy, arg)
    }

    pub fn lms_get_value(&mut self, element: &str) -> String {
        self.get_value_in(Dialect::Legacy, element)
    }

    pub fn lms_set_value(&mut self, element: &str, value: &str) -> &'static str {
        self.set_value_in(Dialect::Legacy, element, value)
    }

    pub fn lms_commit(&mut self, arg: &str) -> &'static str {
        self.commit_in(Dialect::Legacy, arg)
    }

    pub fn lms_get_last_error(&self) -> String {
        self.last_error_in(Dialect::Legacy)
    }

    pub fn lms_get_error_string(&self, code: &str) -> String {
        self.error_string_in(Dialect::Legacy, code)
    }

    pub fn lms_get_diagnostic(&self, code: &str) -> String {
        self.diagnostic_in(Dialect::Legacy, code)
    }

    // ── Name-based dispatch ────────────────────────────────────────

    /// Call a surface function by its content-facing name.
    ///
    /// Unknown names and wrong arities fail with `GeneralException`.
    pub fn invoke(&mut self, function: &str, args: &[&str]) -> String {
        match (function, args) {
            ("Initialize", [arg]) => self.initialize(arg).to_string(),
            ("Terminate", [arg]) => self.terminate(arg).to_string(),
            ("GetValue", [element]) => self.get_value(element),
            ("SetValue", [element, value]) => self.set_value(element, value).to_string(),
            ("Commit", [arg]) => self.commit(arg).to_string(),
            ("GetLastError", []) => self.get_last_error(),
            ("GetErrorString", [code]) => self.get_error_string(code),
            ("GetDiagnostic", [code]) => self.get_diagnostic(code),
            ("LMSInitialize", [arg]) => self.lms_initialize(arg).to_string(),
            ("LMSFinish", [arg]) => self.lms_finish(arg).to_string(),
            ("LMSGetValue", [element]) => self.lms_get_value(element),
            ("LMSSetValue", [element, value]) => self.lms_set_value(element, value).to_string(),
            ("LMSCommit", [arg]) => self.lms_commit(arg).to_string(),
            ("LMSGetLastError", []) => self.lms_get_last_error(),
            ("LMSGetErrorString", [code]) => self.lms_get_error_string(code),
            ("LMSGetDiagnostic", [code]) => self.lms_get_diagnostic(code),
            _ => {
                self.begin();
                self.fail(
                    ErrorCode::GeneralException,
                    format!("no function {}/{}", function, args.len()),
                );
                FALSE.to_string()
            }
        }
    }

    // ── Host-side operations ───────────────────────────────────────

    /// Commit on the controller's behalf. Leaves the content-visible
    /// error untouched. Returns false unless running.
    pub fn checkpoint(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        self.emit(SurfaceEvent::Committed(CommitOrigin::Schedule));
        true
    }

    /// Terminate on the embedding layer's behalf (page teardown).
    /// Returns false unless running.
    pub fn host_terminate(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        self.emit(SurfaceEvent::Terminating { by_host: true });
        self.state = SessionState::Terminated;
        true
    }

    // ---------------------------------------------------------------------------
    // Dialect-parameterized implementations
    // ---------------------------------------------------------------------------

    fn initialize_in(&mut self, dialect: Dialect, arg: &str) -> &'static str {
        self.begin();
        trace!(?dialect, "Initialize");
        match self.state {
            SessionState::Running => {
                return self.fail(ErrorCode::GeneralException, "already initialized")
            }
            SessionState::Terminated => {
                return self.fail(ErrorCode::AlreadyTerminated, "session already terminated")
            }
            SessionState::NotInitialized => {}
        }
        if !arg.is_empty() {
            return self.fail(ErrorCode::InvalidArgument, "argument must be empty");
        }

        self.state = SessionState::Running;
        self.session_dialect = dialect;
        self.emit(SurfaceEvent::Initialized);
        TRUE
    }

    fn terminate_in(&mut self, dialect: Dialect, arg: &str) -> &'static str {
        self.begin();
        trace!(?dialect, "Terminate");
        if let Err(code) = self.check_running() {
            return self.fail(code, "terminate outside a running session");
        }
        if !arg.is_empty() {
            return self.fail(ErrorCode::InvalidArgument, "argument must be empty");
        }

        self.emit(SurfaceEvent::Terminating { by_host: false });
        self.state = SessionState::Terminated;
        TRUE
    }

    fn commit_in(&mut self, dialect: Dialect, arg: &str) -> &'static str {
        self.begin();
        trace!(?dialect, "Commit");
        if let Err(code) = self.check_running() {
            return self.fail(code, "commit outside a running session");
        }
        if !arg.is_empty() {
            return self.fail(ErrorCode::InvalidArgument, "argument must be empty");
        }

        self.emit(SurfaceEvent::Committed(CommitOrigin::Content));
        TRUE
    }

    fn get_value_in(&mut self, dialect: Dialect, key: &str) -> String {
        self.begin();
        trace!(?dialect, key, "GetValue");
        if let Err(code) = self.check_running() {
            self.fail(code, "read outside a running session");
            return String::new();
        }
        if key.is_empty() {
            self.fail(ErrorCode::InvalidArgument, "element name is empty");
            return String::new();
        }

        let adapter = DialectAdapter::new(dialect);
        let result = match adapter.normalize_key(key) {
            CanonicalKey::Element(element) => self
                .store
                .get(element)
                .map(|stored| adapter.outbound_value(element, &stored)),
            CanonicalKey::LessonStatus => Ok(DialectAdapter::lesson_status_outbound(
                self.store.raw(Element::CompletionStatus).unwrap_or_default(),
                self.store.raw(Element::SuccessStatus).unwrap_or_default(),
            )),
            CanonicalKey::Version => Ok(dialect.version().to_string()),
            CanonicalKey::Children(ns) => Ok(ns.children(dialect).to_string()),
            CanonicalKey::Count(_) => Ok("0".to_string()),
            CanonicalKey::LeafChildren(_) => Err(ErrorCode::ElementCannotHaveChildren),
            CanonicalKey::NotArray(_) => Err(ErrorCode::ElementNotArray),
            CanonicalKey::Unimplemented(_) => Err(ErrorCode::NotImplemented),
            CanonicalKey::Extension(name) => self.store.get_extension(&name),
        };

        match result {
            Ok(value) => value,
            Err(code) => {
                self.fail(code, format!("cannot read {}", key));
                String::new()
            }
        }
    }

    fn set_value_in(&mut self, dialect: Dialect, key: &str, value: &str) -> &'static str {
        self.begin();
        trace!(?dialect, key, "SetValue");
        if let Err(code) = self.check_running() {
            return self.fail(code, "write outside a running session");
        }
        if key.is_empty() {
            return self.fail(ErrorCode::InvalidArgument, "element name is empty");
        }

        let adapter = DialectAdapter::new(dialect);
        let result = match adapter.normalize_key(key) {
            CanonicalKey::Element(element) => self.write_element(&adapter, element, value),
            CanonicalKey::LessonStatus => self.write_lesson_status(&adapter, value),
            CanonicalKey::Version | CanonicalKey::Children(_) | CanonicalKey::Count(_) => {
                Err(ErrorCode::ReadOnlyElement)
            }
            CanonicalKey::LeafChildren(_) => Err(ErrorCode::ElementCannotHaveChildren),
            CanonicalKey::NotArray(_) => Err(ErrorCode::ElementNotArray),
            CanonicalKey::Unimplemented(_) => Err(ErrorCode::NotImplemented),
            CanonicalKey::Extension(name) => self.store.set_extension(&name, value),
        };

        match result {
            Ok(()) => TRUE,
            Err(code) => self.fail(code, format!("cannot write {:?} to {}", value, key)),
        }
    }

    fn last_error_in(&self, dialect: Dialect) -> String {
        self.last_error.number(dialect).to_string()
    }

    fn error_string_in(&self, dialect: Dialect, code: &str) -> String {
        ErrorCode::parse(code, dialect)
            .map(|c| c.description(dialect).to_string())
            .unwrap_or_default()
    }

    fn diagnostic_in(&self, dialect: Dialect, code: &str) -> String {
        let requested = if code.trim().is_empty() {
            Some(self.last_error)
        } else {
            ErrorCode::parse(code, dialect)
        };
        match requested {
            Some(c) if c == self.last_error && !self.diagnostic.is_empty() => {
                self.diagnostic.clone()
            }
            Some(c) => c.description(dialect).to_string(),
            None => String::new(),
        }
    }

    // ---------------------------------------------------------------------------
    // Helpers (private)
    // ---------------------------------------------------------------------------

    fn write_element(
        &mut self,
        adapter: &DialectAdapter,
        element: Element,
        value: &str,
    ) -> Result<(), ErrorCode> {
        let canonical = adapter.inbound_value(element, value)?;
        self.store.set(element, &canonical)?;
        self.emit(SurfaceEvent::ValueSet(element));
        Ok(())
    }

    fn write_lesson_status(
        &mut self,
        adapter: &DialectAdapter,
        value: &str,
    ) -> Result<(), ErrorCode> {
        let write = adapter.lesson_status_inbound(value)?;
        match write.success {
            Some(success) => {
                self.store.set(Element::SuccessStatus, success)?;
                self.emit(SurfaceEvent::ValueSet(Element::SuccessStatus));
            }
            None => self.store.host_set(Element::SuccessStatus, "unknown")?,
        }
        self.store.set(Element::CompletionStatus, write.completion)?;
        self.emit(SurfaceEvent::ValueSet(Element::CompletionStatus));
        Ok(())
    }

    fn check_running(&self) -> Result<(), ErrorCode> {
        match self.state {
            SessionState::Running => Ok(()),
            SessionState::NotInitialized => Err(ErrorCode::NotInitialized),
            SessionState::Terminated => Err(ErrorCode::AlreadyTerminated),
        }
    }

    fn begin(&mut self) {
        self.last_error = ErrorCode::NoError;
        self.diagnostic.clear();
    }

    fn fail(&mut self, code: ErrorCode, diagnostic: impl Into<String>) -> &'static str {
        self.last_error = code;
        self.diagnostic = diagnostic.into();
        trace!(%code, diagnostic = %self.diagnostic, "call failed");
        FALSE
    }

    fn emit(&mut self, event: SurfaceEvent) {
        let dialect = self.session_dialect;
        self.observer.on_event(event, &mut self.store, dialect);
    }
}
