use regex::Regex;
use std::sync::OnceLock;

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s-]").expect("static regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn hyphen_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").expect("static regex"))
}

/// Turns a title (or a hand-typed slug) into a URL-safe slug:
/// lowercase, only `[a-z0-9-]`, whitespace runs become one hyphen,
/// repeated hyphens collapse, no leading or trailing hyphen.
pub fn generate_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = disallowed_chars().replace_all(&lowered, "");
    let hyphenated = whitespace_runs().replace_all(stripped.trim(), "-");
    let collapsed = hyphen_runs().replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}

/// The slug input of the post editor.
///
/// While untouched, the slug follows the title. Once the admin types into it,
/// title edits stop affecting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugField {
    value: String,
    manually_edited: bool,
}

impl SlugField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Editor state for an existing post: its slug is treated as chosen.
    pub fn existing(slug: &str) -> Self {
        SlugField { value: slug.to_string(), manually_edited: true }
    }

    /// Rebuilds the field from a submitted form. A non-blank slug input counts
    /// as a manual override; a blank one means "derive from the title".
    pub fn from_form(title: &str, slug_input: Option<&str>) -> Self {
        let mut field = SlugField::new();
        field.on_title_change(title);
        if let Some(input) = slug_input.map(str::trim).filter(|s| !s.is_empty()) {
            field.on_slug_edit(input);
        }
        field
    }

    pub fn on_title_change(&mut self, title: &str) {
        if !self.manually_edited {
            self.value = generate_slug(title);
        }
    }

    pub fn on_slug_edit(&mut self, input: &str) {
        self.manually_edited = true;
        self.value = generate_slug(input);
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_manual(&self) -> bool {
        self.manually_edited
    }
}
