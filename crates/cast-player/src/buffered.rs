//! Seek-bar spans from the engine's buffered intervals.

use cast_proto::protocol::{BufferedSegment, Span};

/// Turn buffered intervals into alternating buffered/gap spans.
///
/// The intervals are trusted to be ascending and non-overlapping, as the
/// engine reports them; nothing is re-sorted here.  With a known duration the
/// spans tile `[0, duration]`: a leading gap covers media before the first
/// interval and a trailing gap runs from the last interval to the end.
pub fn spans(buffered: &[BufferedSegment], duration: Option<f64>) -> Vec<Span> {
    let mut out = Vec::with_capacity(buffered.len() * 2 + 1);

    let Some(first) = buffered.first() else {
        if let Some(d) = duration.filter(|d| *d > 0.0) {
            out.push(Span::gap(d));
        }
        return out;
    };

    if first.start > 0.0 {
        out.push(Span::gap(first.start));
    }

    for (i, segment) in buffered.iter().enumerate() {
        out.push(Span::buffered(segment.len().max(0.0)));

        let gap_end = match buffered.get(i + 1) {
            Some(next) => Some(next.start),
            None => duration,
        };
        if let Some(end) = gap_end {
            let gap = end - segment.end;
            if gap > 0.0 {
                out.push(Span::gap(gap));
            }
        }
    }

    out
}
