#[cfg(test)]
#[path = "script_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_derive::Deserialize;
use serde_derive::Serialize;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"^\s*(?:#|//|--)\s*(\S+)\s+\(Version\s+([1-9][0-9]*)\)\s*$").unwrap();
});

// Fence language tag, file extension. The first tag for an extension is the
// one used when sending scripts back to the model.
const LANGUAGES: [(&str, &str); 34] = [
    ("python", "py"),
    ("py", "py"),
    ("python3", "py"),
    ("javascript", "js"),
    ("js", "js"),
    ("node", "js"),
    ("jsx", "jsx"),
    ("typescript", "ts"),
    ("ts", "ts"),
    ("tsx", "tsx"),
    ("bash", "sh"),
    ("sh", "sh"),
    ("shell", "sh"),
    ("zsh", "sh"),
    ("rust", "rs"),
    ("sql", "sql"),
    ("r", "r"),
    ("ruby", "rb"),
    ("go", "go"),
    ("java", "java"),
    ("kotlin", "kt"),
    ("scala", "scala"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("c++", "cpp"),
    ("csharp", "cs"),
    ("cs", "cs"),
    ("php", "php"),
    ("perl", "pl"),
    ("lua", "lua"),
    ("swift", "swift"),
    ("julia", "jl"),
    ("powershell", "ps1"),
    ("yaml", "yaml"),
];

// Fence tags that never hold a script.
const NON_SOURCE_TAGS: [&str; 8] = ["", "json", "text", "txt", "md", "markdown", "output", "console"];

// Extension for source languages missing from the table and not usable as an
// extension themselves.
const FALLBACK_EXTENSION: &str = "txt";

/// One generated script. Only the current version of a filename is ever
/// stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub filename: String,
    pub version: u32,
    pub content: String,
}

impl Script {
    pub fn new(filename: &str, version: u32, content: &str) -> Script {
        return Script {
            filename: filename.to_string(),
            version,
            content: content.to_string(),
        };
    }

    /// First word of a fence info string, lowercased. "```Python title=x"
    /// gives "python".
    pub fn fence_tag(info: &str) -> String {
        return info
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
    }

    pub fn is_source_tag(tag: &str) -> bool {
        return !NON_SOURCE_TAGS.contains(&Script::fence_tag(tag).as_str());
    }

    /// Maps a fence tag to a script extension. Tags that are not source code
    /// (json, text, ...) return `None`. Unknown languages use the tag itself
    /// when it is a short alphanumeric word.
    pub fn extension_for_language(language: &str) -> Option<String> {
        let tag = Script::fence_tag(language);
        if !Script::is_source_tag(&tag) {
            return None;
        }

        if let Some((_, ext)) = LANGUAGES.iter().find(|(e, _)| return *e == tag) {
            return Some(ext.to_string());
        }

        if tag.len() <= 8 && tag.chars().all(|c| return c.is_ascii_alphanumeric()) {
            return Some(tag);
        }

        return Some(FALLBACK_EXTENSION.to_string());
    }

    /// Plain file names only, nothing that could escape the session
    /// directory.
    pub fn is_valid_filename(filename: &str) -> bool {
        if filename.is_empty() || filename.len() > 128 || filename.starts_with('.') {
            return false;
        }

        return filename
            .chars()
            .all(|c| return c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    }

    /// Parses `<filename> (Version <n>)` out of a leading comment line.
    pub fn parse_header(line: &str) -> Option<(String, u32)> {
        let captures = HEADER_RE.captures(line)?;
        let filename = captures.get(1)?.as_str().to_string();
        let version = captures.get(2)?.as_str().parse::<u32>().ok()?;

        return Some((filename, version));
    }

    /// Fence tag used when sending the script back to the model.
    pub fn fence_language(&self) -> &'static str {
        let ext = self.filename.rsplit('.').next().unwrap_or_default();
        return LANGUAGES
            .iter()
            .find(|(_, e)| return *e == ext)
            .map(|(tag, _)| return *tag)
            .unwrap_or("text");
    }

    fn comment_prefix(&self) -> &'static str {
        let ext = self.filename.rsplit('.').next().unwrap_or_default();
        return match ext {
            "js" | "jsx" | "ts" | "tsx" | "rs" | "go" | "java" | "kt" | "scala" | "c" | "cpp"
            | "cs" | "php" | "swift" => "//",
            "lua" => "--",
            "sql" => "--",
            _ => "#",
        };
    }

    pub fn header(&self) -> String {
        return format!(
            "{} {} (Version {})",
            self.comment_prefix(),
            self.filename,
            self.version
        );
    }

    /// File body as persisted, header line first.
    pub fn render(&self) -> String {
        return format!("{}\n{}", self.header(), self.content);
    }

    /// Inverse of `render`. A body without a header is kept whole at
    /// version 1.
    pub fn from_rendered(filename: &str, body: &str) -> Script {
        let (first_line, rest) = body.split_once('\n').unwrap_or((body, ""));
        if let Some((_, version)) = Script::parse_header(first_line) {
            return Script::new(filename, version, rest);
        }

        return Script::new(filename, 1, body);
    }
}
