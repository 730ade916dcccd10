use rwfuzz_ir::FuncSeed;

/// Similarity above which two keys are treated as the same key.
pub const CONFLICT_THRESHOLD: f64 = 0.99;

/// `1 - levenshtein(a, b) / max(len(a), len(b))`, and 1.0 for two empty
/// strings.
///
/// Lengths and edits count Unicode scalar values, not bytes, so a
/// multi-byte character in a key costs one edit. ASCII keys score the same
/// either way.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Highest similarity between a read key of one seed and a write key of
/// the other, in both directions. 0.0 when no such key pair exists.
pub fn max_similarity(one: &FuncSeed, two: &FuncSeed) -> f64 {
    let cross = |reads: &[String], writes: &[String]| {
        reads
            .iter()
            .flat_map(|r| writes.iter().map(move |w| similarity(r, w)))
            .fold(0.0f64, f64::max)
    };
    cross(&one.read_set, &two.write_set).max(cross(&one.write_set, &two.read_set))
}

/// Whether mutation could plausibly move the pair toward a conflict: one
/// side has read-related paths while the other has write-related paths.
pub fn conflict_potential(one: &FuncSeed, two: &FuncSeed) -> bool {
    let one_read = !one.read_related_value_paths.is_empty();
    let one_write = !one.write_related_value_paths.is_empty();
    let two_read = !two.read_related_value_paths.is_empty();
    let two_write = !two.write_related_value_paths.is_empty();
    (one_read && two_write) || (one_write && two_read)
}
