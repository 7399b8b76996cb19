//! Development and runtime error reporting.
//!
//! Errors are resolved at the boundary function that detects them. Besides
//! returning a typed error, the boundary reports it to an [`ErrorTracer`],
//! the equivalent of the default error tracer of the basic software stack.
//! Reporting is fire-and-forget and never changes control flow.

use tracing::{error, warn};

/// Identifier of the reporting module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ModuleId {
    EthIf = 65,
    EthTSyn = 164,
}

/// Sink for error reports.
///
/// The instance id is always 0 for the modules in this crate; it is kept in
/// the signature so one tracer can serve several module instances.
pub trait ErrorTracer {
    /// A development error: a violated precondition of an API call.
    fn report_error(&self, module: ModuleId, instance: u8, service: u8, error: u8);

    /// A runtime error: the module detected an inconsistency while operating
    /// and continues in a degraded but defined mode.
    fn report_runtime_error(&self, module: ModuleId, instance: u8, service: u8, error: u8);
}

/// An [`ErrorTracer`] that forwards every report to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorTracer;

impl ErrorTracer for TracingErrorTracer {
    fn report_error(&self, module: ModuleId, instance: u8, service: u8, error: u8) {
        error!(
            ?module,
            instance,
            service = format_args!("{service:#04x}"),
            error = format_args!("{error:#04x}"),
            "development error"
        );
    }

    fn report_runtime_error(&self, module: ModuleId, instance: u8, service: u8, error: u8) {
        warn!(
            ?module,
            instance,
            service = format_args!("{service:#04x}"),
            error = format_args!("{error:#04x}"),
            "runtime error"
        );
    }
}

impl<T: ErrorTracer + ?Sized> ErrorTracer for std::rc::Rc<T> {
    fn report_error(&self, module: ModuleId, instance: u8, service: u8, error: u8) {
        (**self).report_error(module, instance, service, error)
    }

    fn report_runtime_error(&self, module: ModuleId, instance: u8, service: u8, error: u8) {
        (**self).report_runtime_error(module, instance, service, error)
    }
}

/// Classification of a module error for reporting purposes.
pub(crate) enum Report {
    /// Report as development error with the given id.
    Development(u8),
    /// Report as runtime error with the given id.
    Runtime(u8),
    /// Dependency failures and protocol anomalies are not reported.
    Silent,
}

pub(crate) fn report(tracer: &dyn ErrorTracer, module: ModuleId, service: u8, kind: Report) {
    match kind {
        Report::Development(id) => tracer.report_error(module, 0, service, id),
        Report::Runtime(id) => tracer.report_runtime_error(module, 0, service, id),
        Report::Silent => {}
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::cell::RefCell;

    use super::*;

    /// Records every report for later inspection.
    #[derive(Debug, Default)]
    pub struct RecordingTracer {
        pub errors: RefCell<Vec<(ModuleId, u8, u8)>>,
        pub runtime_errors: RefCell<Vec<(ModuleId, u8, u8)>>,
    }

    impl ErrorTracer for RecordingTracer {
        fn report_error(&self, module: ModuleId, _instance: u8, service: u8, error: u8) {
            self.errors.borrow_mut().push((module, service, error));
        }

        fn report_runtime_error(&self, module: ModuleId, _instance: u8, service: u8, error: u8) {
            self.runtime_errors.borrow_mut().push((module, service, error));
        }
    }

    #[test]
    fn report_dispatches_by_kind() {
        let tracer = RecordingTracer::default();
        report(&tracer, ModuleId::EthTSyn, 0x42, Report::Development(0x01));
        report(&tracer, ModuleId::EthTSyn, 0x43, Report::Runtime(0x02));
        report(&tracer, ModuleId::EthIf, 0x44, Report::Silent);

        assert_eq!(
            *tracer.errors.borrow(),
            vec![(ModuleId::EthTSyn, 0x42, 0x01)]
        );
        assert_eq!(
            *tracer.runtime_errors.borrow(),
            vec![(ModuleId::EthTSyn, 0x43, 0x02)]
        );
    }
}
