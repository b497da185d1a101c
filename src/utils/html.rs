/// Strip unsafe markup from user-supplied text before it is stored.
///
/// Whitelist-based: harmless tags such as `<b>` survive, `<script>` and
/// event-handler attributes are removed along with script content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Escape plain text so it renders literally inside HTML.
pub fn escape_text(input: &str) -> String {
    ammonia::clean_text(input)
}
