use crate::model::*;

// ── Free-slot search ──────────────────────────────────────────────

/// Gaps of at least `min_duration` inside `[window_start, window_end)`.
///
/// `booked` must yield non-overlapping spans in ascending order. Spans that
/// stick out of the window are clipped by the cursor, never mutated.
pub fn free_slots<'a, I>(booked: I, window_start: Micros, window_end: Micros, min_duration: Micros) -> Vec<Span>
where
    I: IntoIterator<Item = &'a Span>,
{
    let mut slots = Vec::new();
    let mut cursor = window_start;

    for span in booked {
        if span.end <= window_start {
            continue;
        }
        if span.start >= window_end {
            break;
        }
        if span.start - cursor >= min_duration {
            slots.push(Span::new(cursor, span.start));
        }
        cursor = cursor.max(span.end);
    }

    if window_end - cursor >= min_duration {
        slots.push(Span::new(cursor, window_end));
    }

    slots
}
