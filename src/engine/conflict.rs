use crate::model::*;

use super::EngineError;

pub(crate) fn now_us() -> Micros {
    chrono::Utc::now().timestamp_micros()
}

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    use crate::limits::*;
    if span.start < MIN_VALID_TIMESTAMP_US || span.end > MAX_VALID_TIMESTAMP_US {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration() > MAX_SPAN_DURATION_US {
        return Err(EngineError::LimitExceeded("booking too long"));
    }
    Ok(())
}

/// Position at which an interval starting at `start` belongs in `sorted`.
pub(crate) fn insertion_point(sorted: &[Interval], start: Micros) -> usize {
    sorted.partition_point(|i| i.span.start < start)
}

/// Half-open overlap test against the two neighbours of the insertion point.
///
/// `sorted` must be non-overlapping and ordered by start, so only the immediate
/// predecessor and successor can collide. Returns the insertion position when free.
pub(crate) fn check_no_conflict(sorted: &[Interval], span: &Span) -> Result<usize, EngineError> {
    let pos = insertion_point(sorted, span.start);
    if pos > 0 {
        let prev = &sorted[pos - 1];
        if prev.span.end > span.start {
            return Err(EngineError::Conflict(prev.id));
        }
    }
    if let Some(next) = sorted.get(pos)
        && next.span.start < span.end
    {
        return Err(EngineError::Conflict(next.id));
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn sorted(spans: &[(Micros, Micros)]) -> Vec<Interval> {
        spans
            .iter()
            .map(|&(s, e)| Interval { span: Span::new(s, e), id: Ulid::new() })
            .collect()
    }

    #[test]
    fn empty_ledger_never_conflicts() {
        assert_eq!(check_no_conflict(&[], &Span::new(0, 10)), Ok(0));
    }

    #[test]
    fn touching_neighbours_are_free() {
        let list = sorted(&[(100, 200), (300, 400)]);
        assert_eq!(check_no_conflict(&list, &Span::new(200, 300)), Ok(1));
        assert_eq!(check_no_conflict(&list, &Span::new(0, 100)), Ok(0));
        assert_eq!(check_no_conflict(&list, &Span::new(400, 500)), Ok(2));
    }

    #[test]
    fn predecessor_overlap_names_predecessor() {
        let list = sorted(&[(100, 200), (300, 400)]);
        let err = check_no_conflict(&list, &Span::new(150, 250)).unwrap_err();
        assert_eq!(err, EngineError::Conflict(list[0].id));
    }

    #[test]
    fn successor_overlap_names_successor() {
        let list = sorted(&[(100, 200), (300, 400)]);
        let err = check_no_conflict(&list, &Span::new(250, 301)).unwrap_err();
        assert_eq!(err, EngineError::Conflict(list[1].id));
    }

    #[test]
    fn same_start_conflicts() {
        let list = sorted(&[(100, 200)]);
        assert!(check_no_conflict(&list, &Span::new(100, 101)).is_err());
    }

    #[test]
    fn enclosing_span_conflicts() {
        let list = sorted(&[(100, 200)]);
        assert!(check_no_conflict(&list, &Span::new(50, 250)).is_err());
    }

    #[test]
    fn enclosed_span_conflicts() {
        let list = sorted(&[(100, 400)]);
        assert!(check_no_conflict(&list, &Span::new(200, 300)).is_err());
    }

    #[test]
    fn validate_span_at_epoch_boundary() {
        use crate::limits::*;
        assert!(validate_span(&Span::new(MIN_VALID_TIMESTAMP_US, MIN_VALID_TIMESTAMP_US + 1)).is_ok());
        assert!(validate_span(&Span::new(-1, 10)).is_err());
        assert!(validate_span(&Span::new(0, MAX_SPAN_DURATION_US + 1)).is_err());
    }
}
