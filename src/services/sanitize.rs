//! Client filename to storage-key fragment.

use std::path::MAIN_SEPARATOR;

/// Map an arbitrary client-supplied filename onto `[A-Za-z0-9_.-]`.
///
/// Path separators become word breaks, whitespace runs collapse into a single
/// `_`, everything outside the safe set is dropped, and leading/trailing `.`
/// and `_` are trimmed. The result may be empty; callers decide what an empty
/// name means.
pub fn sanitize(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if is_separator(c) { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\' || c == MAIN_SEPARATOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_safe(name: &str) -> bool {
        name.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            && !name.starts_with(['.', '_'])
            && !name.ends_with(['.', '_'])
    }

    #[test]
    fn keeps_plain_names() {
        assert_eq!(sanitize("photo.png"), "photo.png");
        assert_eq!(sanitize("IMG-2024_01.jpeg"), "IMG-2024_01.jpeg");
    }

    #[test]
    fn joins_whitespace_with_underscores() {
        assert_eq!(sanitize("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(sanitize("  lots \t of\n space.png "), "lots_of_space.png");
    }

    #[test]
    fn turns_path_separators_into_word_breaks() {
        assert_eq!(sanitize("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize("C:\\Users\\me\\cat.gif"), "C_Users_me_cat.gif");
        assert_eq!(sanitize("/"), "");
    }

    #[test]
    fn drops_characters_outside_the_safe_set() {
        assert_eq!(sanitize("naïve café.jpg"), "nave_caf.jpg");
        assert_eq!(sanitize("a<b>c:d|e?f*g.png"), "abcdefg.png");
        assert_eq!(sanitize("emoji🎉.webp"), "emoji.webp");
    }

    #[test]
    fn trims_boundary_dots_and_underscores() {
        assert_eq!(sanitize("__.hidden._"), "hidden");
        assert_eq!(sanitize(".bashrc"), "bashrc");
        assert_eq!(sanitize("trailing."), "trailing");
    }

    #[test]
    fn degenerate_names_sanitize_to_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("..."), "");
        assert_eq!(sanitize("  \t "), "");
        assert_eq!(sanitize("日本語"), "");
    }

    #[test]
    fn output_is_always_safe_and_separator_free() {
        let inputs = [
            "../../../../root/.ssh/id_rsa",
            "..\\..\\windows\\system32",
            "a/b\\c/d.png",
            " _.weird name_.png._ ",
            "\0null\x01ctrl.png",
            "%2e%2e%2fencoded.jpg",
            "-dash-.gif",
            "mixed/ÄÖÜ\\äöü.bmp",
        ];
        for input in inputs {
            let out = sanitize(input);
            assert!(is_safe(&out), "{input:?} sanitized to unsafe {out:?}");
            assert!(!out.contains('/') && !out.contains('\\'), "{out:?}");
        }
    }
}
