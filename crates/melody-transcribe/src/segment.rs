use tracing::debug;

/// Segment borders for a recording of `frame_count` frames.
///
/// Borders come from voiced onsets and from voiced-to-silent transitions.
/// Onsets landing on silent frames (or past the end) are dropped. The
/// result is sorted, de-duplicated, starts with 0 and ends with
/// `frame_count`, so consecutive pairs are non-empty half-open segments.
pub fn segment_borders(onsets: &[usize], states: &[bool]) -> Vec<usize> {
    let frame_count = states.len();

    let voiced_onsets = onsets
        .iter()
        .copied()
        .filter(|&i| states.get(i).copied().unwrap_or(false));

    let silence_starts = (1..frame_count).filter(|&i| states[i - 1] && !states[i]);

    let mut borders: Vec<usize> = std::iter::once(0)
        .chain(voiced_onsets)
        .chain(silence_starts)
        .chain(std::iter::once(frame_count))
        .collect();
    borders.sort_unstable();
    borders.dedup();

    debug!(
        onsets = onsets.len(),
        borders = borders.len(),
        "computed segment borders"
    );
    borders
}

/// Half-open `(start, end)` intervals between consecutive borders.
///
/// Zero-length intervals are skipped; [`segment_borders`] never produces
/// them, but hand-built border lists might.
pub fn segments(borders: &[usize]) -> Vec<(usize, usize)> {
    borders
        .windows(2)
        .map(|w| (w[0], w[1]))
        .filter(|(start, end)| end > start)
        .collect()
}
