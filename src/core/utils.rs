/// Expand the stored two-character `\n` escape into real line breaks.
///
/// Test inputs are stored with literal `\n` sequences; programs must see actual newlines.
pub fn expand_newline_escapes(input: &str) -> String {
    input.replace("\\n", "\n")
}
