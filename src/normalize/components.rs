use tracing::debug;

use super::attrs::{parse_attributes, AttributeMap};

/// Which attributes of a component occurrence survive the rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePolicy {
    /// Drop the named attributes, keep the rest.
    Strip(&'static [&'static str]),
    /// Keep only the named attributes.
    KeepOnly(&'static [&'static str]),
}

impl AttributePolicy {
    fn apply(&self, attrs: &mut AttributeMap) {
        match self {
            AttributePolicy::Strip(names) => attrs.retain(|k| !names.contains(&k)),
            AttributePolicy::KeepOnly(names) => attrs.retain(|k| names.contains(&k)),
        }
    }
}

/// One pseudo-component and the HTML it becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRule {
    pub source: &'static str,
    pub target: &'static str,
    pub base_class: &'static str,
    pub policy: AttributePolicy,
    /// Match only `<Name .../>` and emit an explicit open+close pair.
    pub self_closing: bool,
}

impl ComponentRule {
    pub const fn paired(source: &'static str, target: &'static str, base_class: &'static str) -> Self {
        ComponentRule {
            source,
            target,
            base_class,
            policy: AttributePolicy::Strip(&[]),
            self_closing: false,
        }
    }

    pub const fn self_closing(
        source: &'static str,
        target: &'static str,
        base_class: &'static str,
    ) -> Self {
        ComponentRule {
            self_closing: true,
            ..Self::paired(source, target, base_class)
        }
    }

    pub const fn strip(self, names: &'static [&'static str]) -> Self {
        ComponentRule {
            policy: AttributePolicy::Strip(names),
            ..self
        }
    }

    pub const fn keep_only(self, names: &'static [&'static str]) -> Self {
        ComponentRule {
            policy: AttributePolicy::KeepOnly(names),
            ..self
        }
    }

    fn target_is_void(&self) -> bool {
        matches!(self.target, "img" | "input" | "br" | "hr")
    }
}

const VARIANT_PROPS: &[&str] = &["variant", "size", "asChild"];
const TAB_VALUE_PROPS: &[&str] = &["value", "defaultValue", "onValueChange"];

/// Rewrite catalog, applied in order. Source names are unique.
pub const COMPONENT_RULES: &[ComponentRule] = &[
    ComponentRule::paired("Button", "button", "arena-btn").strip(VARIANT_PROPS),
    ComponentRule::paired("Badge", "span", "arena-badge").strip(VARIANT_PROPS),
    ComponentRule::paired("Card", "div", "arena-card"),
    ComponentRule::paired("CardHeader", "div", "arena-card-header"),
    ComponentRule::paired("CardContent", "div", "arena-card-content"),
    ComponentRule::paired("CardTitle", "h3", "arena-card-title"),
    ComponentRule::paired("CardDescription", "p", "arena-card-description"),
    ComponentRule::paired("CardFooter", "div", "arena-card-footer"),
    ComponentRule::paired("Tabs", "div", "arena-tabs").strip(TAB_VALUE_PROPS),
    ComponentRule::paired("TabsList", "div", "arena-tabs-list"),
    ComponentRule::paired("TabsTrigger", "button", "arena-tabs-trigger").strip(TAB_VALUE_PROPS),
    ComponentRule::paired("TabsContent", "div", "arena-tabs-content").strip(TAB_VALUE_PROPS),
    ComponentRule::paired("Link", "a", "arena-link")
        .keep_only(&["href", "target", "rel", "title", "className", "class"]),
    ComponentRule::paired("Input", "input", "arena-input").strip(&["asChild"]),
    ComponentRule::paired("Label", "label", "arena-label").strip(&["asChild"]),
    ComponentRule::paired("Textarea", "textarea", "arena-textarea").strip(&["asChild"]),
    ComponentRule::paired("Avatar", "div", "arena-avatar"),
    ComponentRule::paired("AvatarImage", "img", "arena-avatar-image")
        .keep_only(&["src", "alt", "className", "class"]),
    ComponentRule::paired("AvatarFallback", "span", "arena-avatar-fallback"),
    ComponentRule::self_closing("Image", "div", "arena-image").keep_only(&["src", "alt"]),
];

/// Replace every recognised pseudo-component with its HTML equivalent.
pub fn rewrite_components(html: &str) -> String {
    rewrite_with(html, COMPONENT_RULES)
}

/// Apply `rules` in order. Each rule sees the output of the previous one.
pub fn rewrite_with(html: &str, rules: &[ComponentRule]) -> String {
    let mut out = html.to_string();
    for rule in rules {
        let (next, count) = apply_rule(&out, rule);
        if count > 0 {
            debug!(component = rule.source, count, "rewrote component tags");
        }
        out = next;
    }
    out
}

fn apply_rule(html: &str, rule: &ComponentRule) -> (String, usize) {
    let mut out = String::with_capacity(html.len());
    let mut count = 0;
    let mut cursor = 0;
    let mut search = 0;

    while let Some(tag) = find_tag(html, rule.source, search) {
        search = tag.end;
        if rule.self_closing && !tag.self_closed {
            continue;
        }
        out.push_str(&html[cursor..tag.start]);
        out.push_str(&render_open_tag(rule, tag.attrs));
        if rule.self_closing || (tag.self_closed && !rule.target_is_void()) {
            out.push_str(&format!("</{}>", rule.target));
        }
        cursor = tag.end;
        count += 1;
    }
    out.push_str(&html[cursor..]);

    if rule.self_closing {
        return (out, count);
    }
    (replace_closing_tags(&out, rule), count)
}

fn render_open_tag(rule: &ComponentRule, attrs_src: &str) -> String {
    let mut attrs = parse_attributes(attrs_src);
    rule.policy.apply(&mut attrs);

    let mut classes = vec![rule.base_class.to_string()];
    for key in ["className", "class"] {
        if let Some(value) = attrs.remove(key) {
            classes.extend(class_tokens(&value));
        }
    }

    let mut tag = format!(
        "<{} class=\"{}\"",
        rule.target,
        html_escape::encode_double_quoted_attribute(&classes.join(" "))
    );
    for (name, value) in attrs.iter() {
        tag.push_str(&format!(
            " {}=\"{}\"",
            name,
            html_escape::encode_double_quoted_attribute(value)
        ));
    }
    tag.push('>');
    tag
}

fn class_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '{' | '}'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn replace_closing_tags(html: &str, rule: &ComponentRule) -> String {
    let needle = format!("</{}", rule.source);
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(rel) = html[cursor..].find(&needle) {
        let start = cursor + rel;
        let after_name = start + needle.len();
        let rest = &html[after_name..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with('>') {
            let end = after_name + (rest.len() - trimmed.len()) + 1;
            out.push_str(&html[cursor..start]);
            out.push_str(&format!("</{}>", rule.target));
            cursor = end;
        } else {
            out.push_str(&html[cursor..after_name]);
            cursor = after_name;
        }
    }
    out.push_str(&html[cursor..]);
    out
}

/// An opening (or self-closed) tag found by [`find_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TagMatch<'a> {
    start: usize,
    end: usize,
    attrs: &'a str,
    self_closed: bool,
}

/// Find the next `<name ...>` at or after `from`. The name must be followed
/// by whitespace, `/` or `>`, so `Card` never matches `<CardHeader>`.
///
/// A `>` inside quotes or braces does not end the tag, so arrow functions in
/// handlers are tolerated. A tag with no terminating `>` is not a match.
fn find_tag<'a>(html: &'a str, name: &str, from: usize) -> Option<TagMatch<'a>> {
    let needle = format!("<{name}");
    let bytes = html.as_bytes();
    let mut search = from;

    loop {
        let start = search + html.get(search..)?.find(&needle)?;
        let name_end = start + needle.len();
        search = name_end;

        match bytes.get(name_end) {
            Some(b) if b.is_ascii_whitespace() || *b == b'/' || *b == b'>' => {}
            _ => continue,
        }

        let Some(gt) = scan_tag_end(bytes, name_end) else {
            continue;
        };
        let inner = &html[name_end..gt];
        let trimmed = inner.trim_end();
        let (attrs, self_closed) = match trimmed.strip_suffix('/') {
            Some(attrs) => (attrs, true),
            None => (inner, false),
        };
        return Some(TagMatch {
            start,
            end: gt + 1,
            attrs,
            self_closed,
        });
    }
}

fn scan_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;

    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Some(i),
                b'<' if depth == 0 => return None,
                _ => {}
            },
        }
    }
    None
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn button_strips_variant() {
        assert_eq!(
            rewrite_components(r#"<Button variant="primary">Go</Button>"#),
            r#"<button class="arena-btn">Go</button>"#
        );
    }

    #[test]
    fn card_merges_class_name() {
        let out = rewrite_components(r#"<Card className="shadow-lg rounded"><p>x</p></Card>"#);
        assert_eq!(out, r#"<div class="arena-card shadow-lg rounded"><p>x</p></div>"#);
    }

    #[test]
    fn image_emits_open_close_pair() {
        assert_eq!(
            rewrite_components(r#"<Image src="a.png" alt="Logo" />"#),
            r#"<div class="arena-image" src="a.png" alt="Logo"></div>"#
        );
    }

    #[test]
    fn image_keep_list_drops_everything_else() {
        let out = rewrite_components(r#"<Image src="a.png" width={640} priority alt="x" loading="lazy"/>"#);
        assert_eq!(out, r#"<div class="arena-image" src="a.png" alt="x"></div>"#);
    }

    #[test]
    fn unclosed_image_is_left_alone() {
        let html = r#"<Image src="a.png">"#;
        assert_eq!(rewrite_components(html), html);
    }

    #[test]
    fn prefix_names_do_not_collide() {
        let out = rewrite_components(
            "<Card><CardHeader><CardTitle>Pro</CardTitle></CardHeader><CardContent>$9</CardContent></Card>",
        );
        assert_eq!(
            out,
            concat!(
                r#"<div class="arena-card"><div class="arena-card-header">"#,
                r#"<h3 class="arena-card-title">Pro</h3></div>"#,
                r#"<div class="arena-card-content">$9</div></div>"#
            )
        );
    }

    #[test]
    fn link_keeps_only_navigation_attributes() {
        let out = rewrite_components(r#"<Link href="/signup" prefetch={false} className="cta">Start</Link>"#);
        assert_eq!(out, r#"<a class="arena-link cta" href="/signup">Start</a>"#);
    }

    #[test]
    fn attribute_values_are_escaped() {
        let out = rewrite_components(r#"<Badge title='Fast & "free" <3'>New</Badge>"#);
        assert_eq!(
            out,
            r#"<span class="arena-badge" title="Fast &amp; &quot;free&quot; &lt;3">New</span>"#
        );
    }

    #[test]
    fn arrow_function_does_not_end_tag() {
        let out = rewrite_components(r#"<Button onClick={() => go()} size="lg">Buy</Button>"#);
        assert_eq!(
            out,
            r#"<button class="arena-btn" onClick="() =&gt; go()">Buy</button>"#
        );
    }

    #[test]
    fn self_closed_paired_component_gets_close_tag() {
        assert_eq!(
            rewrite_components("<Avatar />"),
            r#"<div class="arena-avatar"></div>"#
        );
        assert_eq!(
            rewrite_components(r#"<Input placeholder="you@company.com" />"#),
            r#"<input class="arena-input" placeholder="you@company.com">"#
        );
    }

    #[test]
    fn closing_tag_with_whitespace() {
        assert_eq!(
            rewrite_components("<Label>Email</Label >"),
            r#"<label class="arena-label">Email</label>"#
        );
    }

    #[test]
    fn unknown_components_untouched() {
        let html = "<Carousel><Slide>1</Slide></Carousel>";
        assert_eq!(rewrite_components(html), html);
    }

    #[test]
    fn source_names_are_unique() {
        let names: HashSet<_> = COMPONENT_RULES.iter().map(|r| r.source).collect();
        assert_eq!(names.len(), COMPONENT_RULES.len());
        assert_eq!(COMPONENT_RULES.last().map(|r| r.self_closing), Some(true));
    }

    #[rstest]
    #[case("Badge", "span", "arena-badge")]
    #[case("CardDescription", "p", "arena-card-description")]
    #[case("CardFooter", "div", "arena-card-footer")]
    #[case("Tabs", "div", "arena-tabs")]
    #[case("TabsList", "div", "arena-tabs-list")]
    #[case("TabsTrigger", "button", "arena-tabs-trigger")]
    #[case("TabsContent", "div", "arena-tabs-content")]
    #[case("Textarea", "textarea", "arena-textarea")]
    #[case("AvatarFallback", "span", "arena-avatar-fallback")]
    fn paired_rule_rewrites(#[case] source: &str, #[case] target: &str, #[case] class: &str) {
        let input = format!(r#"<{source} value="x">body</{source}>"#);
        let out = rewrite_components(&input);
        assert!(out.starts_with(&format!(r#"<{target} class="{class}""#)), "{out}");
        assert!(out.ends_with(&format!(">body</{target}>")), "{out}");
        assert!(!out.contains(source));
    }

    #[test]
    fn custom_rules_use_same_routine() {
        const RULES: &[ComponentRule] =
            &[ComponentRule::paired("Hero", "section", "x-hero").strip(&["tone"])];
        assert_eq!(
            rewrite_with(r#"<Hero tone="dark" id="top">Hi</Hero>"#, RULES),
            r#"<section class="x-hero" id="top">Hi</section>"#
        );
    }
}
