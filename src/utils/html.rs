use ammonia;

/// Clean user-supplied HTML using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) survive,
/// dangerous tags (<script>, <iframe>) and event attributes are stripped.
/// Applied to post content and comment bodies before they are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
