//! Text injections into the staged `index.html` and `main.js`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};
use tracing::debug;

use crate::constants::{INJECT_PATHS_END, INJECT_PATHS_START, INJECT_THEME_END, INJECT_THEME_START};
use crate::options::{BuildType, Theme};
use crate::util::fs as ufs;

const CSP_RULE: &str = "localhost:* 127.0.0.1:*";

static SCRIPT_TAG: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<script\b[^>]*>")
        .case_insensitive(true)
        .build()
        .expect("valid script regex")
});
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});
static BODY_END: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"</body\s*>")
        .case_insensitive(true)
        .build()
        .expect("valid body regex")
});
static META_TAG: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<meta\b[^>]*>")
        .case_insensitive(true)
        .build()
        .expect("valid meta regex")
});
static SCRIPT_SRC: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"script-src([^;]*)")
        .case_insensitive(true)
        .build()
        .expect("valid csp regex")
});
static BASE_URL: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"([\t ]*)('|")?baseUrl['"]?\s*:\s*['"](.*?)['"],"#)
        .case_insensitive(true)
        .build()
        .expect("valid baseUrl regex")
});
static TRANSLATIONS: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"([\t ]*)('|")?ojtranslations['"]?\s*:\s*['"](.*?)['"],"#)
        .case_insensitive(true)
        .build()
        .expect("valid translations regex")
});

fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") { "\r\n" } else { "\n" }
}

fn tags_regex(start: &str, end: &str) -> Regex {
    let pattern = format!(
        r"([\t ]*)({})((?s:.)*?)({})",
        regex::escape(start),
        regex::escape(end)
    );
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .expect("escaped injector tags form a valid regex")
}

/// Replaces whatever sits between `start` and `end` with `inner`.
/// Returns `None` when the tags are absent.
pub fn replace_between_tags(content: &str, start: &str, end: &str, inner: &str) -> Option<String> {
    let pattern = tags_regex(start, end);
    if !pattern.is_match(content) {
        return None;
    }
    let eol = line_ending(content);
    let replaced = pattern.replace_all(content, |caps: &Captures| {
        let indent = &caps[1];
        if inner.is_empty() {
            format!("{indent}{start}{eol}{indent}{end}")
        } else {
            format!("{indent}{start}{eol}{inner}{eol}{indent}{end}")
        }
    });
    Some(replaced.into_owned())
}

/// Content currently held between the tags.
pub fn between_tags(content: &str, start: &str, end: &str) -> Option<String> {
    tags_regex(start, end)
        .captures(content)
        .map(|caps| caps[3].to_string())
}

pub fn theme_link(theme: &Theme, build_type: BuildType, styles: &str) -> String {
    format!(
        r#"<link rel="stylesheet" href="{styles}/{}/{}{}" id="css" />"#,
        theme.css_rel_dir(),
        theme.name,
        build_type.css_ext()
    )
}

/// Points the theme injector block of `index.html` at the theme stylesheet.
pub fn inject_theme(index_html: &Path, theme: &Theme, build_type: BuildType, styles: &str) -> Result<()> {
    if !index_html.is_file() {
        debug!("{} not found, skipping theme injection", index_html.display());
        return Ok(());
    }
    let content = ufs::read_to_string(index_html)?;
    let link = theme_link(theme, build_type, styles);
    let indent = tags_regex(INJECT_THEME_START, INJECT_THEME_END)
        .captures(&content)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default();
    let inner = format!("{indent}{link}");
    if let Some(updated) = replace_between_tags(&content, INJECT_THEME_START, INJECT_THEME_END, &inner)
    {
        ufs::write_string(index_html, &updated)?;
    }
    Ok(())
}

#[derive(Debug)]
struct Tag {
    start: usize,
    end: usize,
    attrs: Vec<(String, String)>,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn parse_tags(content: &str, pattern: &Regex) -> Vec<Tag> {
    pattern
        .find_iter(content)
        .map(|found| Tag {
            start: found.start(),
            end: found.end(),
            attrs: ATTRIBUTE
                .captures_iter(found.as_str())
                .map(|caps| {
                    let value = caps
                        .get(2)
                        .or_else(|| caps.get(3))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    (caps[1].to_string(), value)
                })
                .collect(),
        })
        .collect()
}

fn is_plain_javascript(tag: &Tag) -> bool {
    match tag.attr("type") {
        None => true,
        Some(kind) => kind == "text/javascript",
    }
}

fn script_element(src: &str) -> String {
    format!(r#"<script type="text/javascript" src="{src}"></script>"#)
}

/// Adds `<script>` elements for `srcs` before the first JavaScript script,
/// or at the end of `<body>`. Existing sources are left alone. Returns true
/// when the document changed.
pub fn insert_scripts(content: &mut String, srcs: &[&str]) -> bool {
    let eol = line_ending(content);
    let mut changed = false;
    for src in srcs {
        let tags = parse_tags(content, &SCRIPT_TAG);
        if tags.iter().any(|tag| tag.attr("src") == Some(*src)) {
            continue;
        }
        let element = script_element(src);
        if let Some(first) = tags.iter().find(|tag| is_plain_javascript(tag)) {
            content.insert_str(first.start, &format!("{element}{eol}    "));
        } else if let Some(body) = BODY_END.find(content) {
            content.insert_str(body.start(), &format!("{element}{eol}  "));
        } else {
            continue;
        }
        changed = true;
    }
    changed
}

pub fn inject_script_tags(index_html: &Path, srcs: &[&str]) -> Result<bool> {
    let mut content = ufs::read_to_string(index_html)?;
    if insert_scripts(&mut content, srcs) {
        ufs::write_string(index_html, &content)?;
        return Ok(true);
    }
    Ok(false)
}

/// Inserts the CDN bundle-config script right after the require.js script.
pub fn insert_after_require_script(content: &mut String, src: &str) -> bool {
    let eol = line_ending(content);
    let tags = parse_tags(content, &SCRIPT_TAG);
    if tags.iter().any(|tag| tag.attr("src") == Some(src)) {
        return false;
    }
    let Some(require) = tags.iter().find(|tag| {
        is_plain_javascript(tag) && tag.attr("src").is_some_and(|value| value.contains("require"))
    }) else {
        return false;
    };
    let close = content[require.end..]
        .find("</script>")
        .map(|offset| require.end + offset + "</script>".len())
        .unwrap_or(require.end);
    content.insert_str(close, &format!("{eol}    {}", script_element(src)));
    true
}

pub fn inject_cdn_bundle_script(index_html: &Path, src: &str) -> Result<()> {
    if !index_html.is_file() {
        return Ok(());
    }
    let mut content = ufs::read_to_string(index_html)?;
    if insert_after_require_script(&mut content, src) {
        ufs::write_string(index_html, &content)?;
    }
    Ok(())
}

/// Appends `localhost:* 127.0.0.1:*` to the CSP `script-src` directive.
pub fn add_localhost_csp(content: &str) -> Option<String> {
    let metas = parse_tags(content, &META_TAG);
    let meta = metas.iter().find(|tag| {
        tag.attr("http-equiv")
            .is_some_and(|value| value.eq_ignore_ascii_case("Content-Security-Policy"))
    })?;
    let policy = meta.attr("content")?;
    if policy.contains(CSP_RULE) {
        return None;
    }
    let updated_policy = match SCRIPT_SRC.find(policy) {
        Some(found) => {
            let directive = found.as_str().trim_end();
            let replacement = format!("{directive} {CSP_RULE}");
            policy.replacen(directive, &replacement, 1)
        }
        None => format!("{policy}; script-src {CSP_RULE}"),
    };
    let tag_text = &content[meta.start..meta.end];
    let new_tag = tag_text.replacen(policy, &updated_policy, 1);
    let mut result = String::with_capacity(content.len() + CSP_RULE.len() + 16);
    result.push_str(&content[..meta.start]);
    result.push_str(&new_tag);
    result.push_str(&content[meta.end..]);
    Some(result)
}

pub fn inject_localhost_csp(index_html: &Path) -> Result<()> {
    if !index_html.is_file() {
        return Ok(());
    }
    let content = ufs::read_to_string(index_html)?;
    if let Some(updated) = add_localhost_csp(&content) {
        ufs::write_string(index_html, &updated)?;
    }
    Ok(())
}

/// `{ "key":"path", ... }` block injected into the require.js config.
pub fn paths_block(mapping: &BTreeMap<String, String>) -> String {
    if mapping.is_empty() {
        return "\n{\n}\n".to_string();
    }
    let entries: Vec<String> = mapping
        .iter()
        .map(|(key, value)| format!("  \"{key}\":\"{value}\""))
        .collect();
    format!("\n{{\n{}\n}}\n", entries.join(",\n")).replace('\\', "/")
}

fn windows_resource_paths(content: &str) -> String {
    let eol = line_ending(content);
    let Some(caps) = TRANSLATIONS.captures(content) else {
        return content.to_string();
    };
    let entry = caps[0].to_string();
    let indent = &caps[1];
    let quote = caps.get(2).map(|m| m.as_str()).unwrap_or("'");
    let resources = &caps[3];
    let resource = |name: &str| {
        format!("{quote}ojtranslations/nls/{name}{quote}:{quote}{resources}/root/{name}{quote}")
    };
    let replacement = format!(
        "{entry}{eol}{indent}{},{eol}{indent}{},{eol}{indent}{},",
        resource("ojtranslations"),
        resource("localeElements"),
        resource("timezoneData")
    );
    content.replacen(&entry, &replacement, 1)
}

fn windows_locale_config(content: &str) -> String {
    let eol = line_ending(content);
    let i = "  ";
    format!(
        "{content},{eol}{i}{i}config: {{{eol}{i}{i}{i}ojL10n: {{{eol}{i}{i}{i}{i}localePrefix: 'locale_'{eol}{i}{i}{i}}}{eol}{i}{i}}}"
    )
}

/// Rewrites the require paths block (and `baseUrl`) of a main.js source.
pub fn rewrite_main_js(
    source: &str,
    mapping: Option<&BTreeMap<String, String>>,
    base_url: Option<&str>,
    windows: bool,
) -> String {
    let mut inner = match mapping {
        Some(mapping) => paths_block(mapping),
        None => between_tags(source, INJECT_PATHS_START, INJECT_PATHS_END).unwrap_or_default(),
    };
    if windows {
        inner = windows_locale_config(&windows_resource_paths(&inner));
    }
    let trimmed = inner.trim_matches(|c| c == '\n' || c == '\r');
    let mut result = replace_between_tags(source, INJECT_PATHS_START, INJECT_PATHS_END, trimmed)
        .unwrap_or_else(|| source.to_string());

    if let Some(base_url) = base_url.filter(|value| !value.is_empty())
        && let Some(caps) = BASE_URL.captures(&result)
    {
        let indent = caps[1].to_string();
        let quote = caps.get(2).map(|m| m.as_str()).unwrap_or("'").to_string();
        let line = format!("{indent}baseUrl: {quote}{base_url}{quote},");
        result = BASE_URL
            .replace_all(&result, regex::NoExpand(&line))
            .into_owned();
    }
    result
}

/// Injects the paths mapping into `source`, writing the result to `dest`.
pub fn inject_paths(
    source: &Path,
    dest: &Path,
    mapping: &BTreeMap<String, String>,
    base_url: Option<&str>,
    windows: bool,
) -> Result<bool> {
    if !source.is_file() {
        return Ok(false);
    }
    let content = ufs::read_to_string(source)?;
    let updated = rewrite_main_js(&content, Some(mapping), base_url, windows);
    ufs::write_string(dest, &updated)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme() -> Theme {
        Theme {
            name: "alta".into(),
            platform: "web".into(),
            version: "8.0.0".into(),
            compile: false,
        }
    }

    #[test]
    fn theme_link_for_release() {
        assert_eq!(
            theme_link(&theme(), BuildType::Release, "css"),
            r#"<link rel="stylesheet" href="css/alta/8.0.0/web/alta.min.css" id="css" />"#
        );
    }

    #[test]
    fn replaces_theme_block_and_keeps_crlf() {
        let html = "<head>\r\n    <!-- injector:theme -->\r\n    <link rel=\"stylesheet\" href=\"old.css\">\r\n    <!-- endinjector -->\r\n</head>";
        let link = format!("    {}", theme_link(&theme(), BuildType::Dev, "css"));
        let out = replace_between_tags(html, INJECT_THEME_START, INJECT_THEME_END, &link).unwrap();
        assert!(!out.contains("old.css"));
        assert!(out.contains(
            "<!-- injector:theme -->\r\n    <link rel=\"stylesheet\" href=\"css/alta/8.0.0/web/alta.css\" id=\"css\" />\r\n    <!-- endinjector -->"
        ));
    }

    #[test]
    fn missing_tags_leave_content_alone() {
        assert!(replace_between_tags("<head></head>", INJECT_THEME_START, INJECT_THEME_END, "x").is_none());
    }

    #[test]
    fn scripts_go_before_first_javascript() {
        let mut html = String::from(
            "<body>\n    <script type=\"text/html\" id=\"tpl\"></script>\n    <script src=\"js/libs/require/require.js\"></script>\n</body>",
        );
        assert!(insert_scripts(&mut html, &["js/cordovaMocks.js", "cordova.js"]));
        let mocks = html.find("js/cordovaMocks.js").unwrap();
        let cordova = html.find("src=\"cordova.js\"").unwrap();
        let require = html.find("require.js").unwrap();
        let template = html.find("text/html").unwrap();
        assert!(template < cordova && cordova < mocks && mocks < require);
        assert!(!insert_scripts(&mut html, &["cordova.js"]));
    }

    #[test]
    fn scripts_fall_back_to_body_end() {
        let mut html = String::from("<body>\n  <div></div>\n</body>");
        assert!(insert_scripts(&mut html, &["cordova.js"]));
        assert!(html.contains("<script type=\"text/javascript\" src=\"cordova.js\"></script>\n  </body>"));
    }

    #[test]
    fn cdn_bundle_follows_require_script() {
        let mut html = String::from(
            "<body>\n    <script type=\"text/javascript\" src=\"js/libs/require/require.js\"></script>\n    <script src=\"js/main.js\"></script>\n</body>",
        );
        assert!(insert_after_require_script(&mut html, "https://cdn/jet/bundles-config.js"));
        let require = html.find("require.js").unwrap();
        let bundle = html.find("bundles-config.js").unwrap();
        let main = html.find("js/main.js").unwrap();
        assert!(require < bundle && bundle < main);
        assert!(!insert_after_require_script(&mut html, "https://cdn/jet/bundles-config.js"));
    }

    #[test]
    fn csp_rule_extends_script_src() {
        let html = r#"<meta http-equiv="Content-Security-Policy" content="default-src 'self'; script-src 'self' 'unsafe-eval'; style-src 'self'">"#;
        let out = add_localhost_csp(html).unwrap();
        assert!(out.contains("script-src 'self' 'unsafe-eval' localhost:* 127.0.0.1:*; style-src"));
        assert!(add_localhost_csp(&out).is_none());
    }

    #[test]
    fn csp_rule_added_when_script_src_missing() {
        let html = r#"<meta http-equiv="Content-Security-Policy" content="default-src 'self'">"#;
        let out = add_localhost_csp(html).unwrap();
        assert!(out.contains("default-src 'self'; script-src localhost:* 127.0.0.1:*"));
    }

    #[test]
    fn main_js_paths_and_base_url() {
        let main = "requirejs.config(\n  {\n    baseUrl: 'js',\n    paths:\n    //injector:mainReleasePaths\n    {}\n    //endinjector\n  });\n";
        let mut mapping = BTreeMap::new();
        mapping.insert("knockout".to_string(), "libs/knockout/knockout-3.5.0".to_string());
        mapping.insert("ojs".to_string(), "libs\\oj\\v8.0.0\\min".to_string());
        let out = rewrite_main_js(main, Some(&mapping), Some("scripts"), false);
        assert!(out.contains("baseUrl: 'scripts',"));
        assert!(out.contains("\"knockout\":\"libs/knockout/knockout-3.5.0\",\n  \"ojs\":\"libs/oj/v8.0.0/min\""));
        assert!(!out.contains("{}"));
    }

    #[test]
    fn windows_adds_locale_resources() {
        let main = "//injector:mainReleasePaths\n//endinjector\n";
        let mut mapping = BTreeMap::new();
        mapping.insert("ojtranslations".to_string(), "libs/oj/v8.0.0/resources".to_string());
        mapping.insert("text".to_string(), "libs/require/text".to_string());
        let out = rewrite_main_js(main, Some(&mapping), None, true);
        assert!(out.contains("\"ojtranslations/nls/localeElements\":\"libs/oj/v8.0.0/resources/root/localeElements\","));
        assert!(out.contains("localePrefix: 'locale_'"));
    }
}
