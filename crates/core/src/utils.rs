/// Strips anything but alphanumerics, whitespace, and a small set of
/// punctuation commonly present in names/addresses before they are hashed,
/// logged, or compared. Used wherever untrusted free text ends up in an
/// audit event or a log line.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "-_.@,#".contains(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_string_drops_control_and_punctuation() {
        assert_eq!(sanitize_string("Jane<Doe>;DROP"), "JaneDoeDROP");
        assert_eq!(sanitize_string("123 Main St, Apt #4"), "123 Main St, Apt #4");
    }
}
