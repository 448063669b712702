use crate::error::CoreError;

/// Lifecycle phase of a timeline store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelinePhase {
    /// No listeners attached, channels empty.
    #[default]
    Uninitialized,
    /// A load is in flight.
    Loading,
    /// Channels reflect the active chain; listeners attached.
    Ready,
    /// A single pagination request is in flight.
    Paginating,
}

impl TimelinePhase {
    /// Whether an initial load completed at some point.
    pub fn is_initialized(self) -> bool {
        matches!(self, TimelinePhase::Ready | TimelinePhase::Paginating)
    }

    /// Enter the loading phase. Loads are allowed from any phase except
    /// while a pagination holds the store.
    pub fn begin_load(&mut self) -> Result<(), CoreError> {
        if *self == TimelinePhase::Paginating {
            return Err(CoreError::pagination_in_flight());
        }
        *self = TimelinePhase::Loading;
        Ok(())
    }

    /// Finish a load, successful or not. A failed load on an initialized
    /// store falls back to `Ready`; on a fresh store back to `Uninitialized`.
    pub fn finish_load(&mut self, initialized: bool) {
        *self = if initialized {
            TimelinePhase::Ready
        } else {
            TimelinePhase::Uninitialized
        };
    }

    /// Acquire the single-flight pagination slot.
    ///
    /// Must be released with [`TimelinePhase::end_pagination`] on every exit
    /// path: success, failure, and boundary rejection.
    pub fn begin_pagination(&mut self) -> Result<(), CoreError> {
        match *self {
            TimelinePhase::Ready => {
                *self = TimelinePhase::Paginating;
                Ok(())
            }
            TimelinePhase::Paginating => Err(CoreError::pagination_in_flight()),
            TimelinePhase::Uninitialized | TimelinePhase::Loading => Err(CoreError::not_ready()),
        }
    }

    /// Release the pagination slot.
    pub fn end_pagination(&mut self) {
        if *self == TimelinePhase::Paginating {
            *self = TimelinePhase::Ready;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_requires_a_completed_load() {
        let mut phase = TimelinePhase::default();
        let err = phase.begin_pagination().expect_err("must reject");
        assert_eq!(err.code, "not_ready");

        phase.begin_load().expect("load");
        let err = phase.begin_pagination().expect_err("still loading");
        assert_eq!(err.code, "not_ready");

        phase.finish_load(true);
        phase.begin_pagination().expect("ready now");
        assert_eq!(phase, TimelinePhase::Paginating);
    }

    #[test]
    fn second_pagination_is_rejected_until_release() {
        let mut phase = TimelinePhase::Ready;
        phase.begin_pagination().expect("first");
        let err = phase.begin_pagination().expect_err("single flight");
        assert_eq!(err.code, "pagination_in_flight");

        phase.end_pagination();
        phase.begin_pagination().expect("released");
    }

    #[test]
    fn load_is_rejected_while_a_pagination_is_in_flight() {
        let mut phase = TimelinePhase::Ready;
        phase.begin_pagination().expect("paginate");

        let err = phase.begin_load().expect_err("load must wait");
        assert_eq!(err.code, "pagination_in_flight");

        phase.end_pagination();
        phase.begin_load().expect("load after release");
    }

    #[test]
    fn failed_first_load_returns_to_uninitialized() {
        let mut phase = TimelinePhase::default();
        phase.begin_load().expect("load");
        phase.finish_load(false);
        assert_eq!(phase, TimelinePhase::Uninitialized);
        assert!(!phase.is_initialized());
    }
}
