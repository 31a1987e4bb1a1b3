//! Stylesheet and declaration-block parsing on top of `cssparser`.

use cssparser::{
    parse_important, AtRuleParser, AtRuleType, CowRcStr, DeclarationListParser, DeclarationParser,
    ParseError, Parser, ParserInput, QualifiedRuleParser, RuleListParser, SourceLocation, Token,
};
use log::debug;

use super::media::{supports, MediaContext};
use super::selector::Selector;
use super::Declaration;

/// One qualified rule: the selectors of its list that parsed, and its
/// declarations.
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
    /// Index into [`StyleSheet::layers`] of the cascade layer the rule sits
    /// in; `None` for unlayered rules.
    pub layer: Option<usize>,
}

/// A parsed author or user-agent stylesheet.
///
/// `@media` and `@supports` blocks are evaluated when the sheet is parsed and
/// their rules kept or dropped; `@layer` blocks are flattened into the rule
/// list with their layer recorded. Other at-rules are skipped. Selectors that
/// cannot match in a static render (`:hover`, `::before`, ...) are dropped
/// one by one; a rule goes only when none of its selectors is left.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    rules: Vec<StyleRule>,
    layers: Vec<String>,
}

impl StyleSheet {
    pub fn parse(css: &str) -> Self {
        Self::parse_for(css, &MediaContext::default())
    }

    pub fn parse_for(css: &str, media: &MediaContext) -> Self {
        let mut sheet = Self::default();
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let rules = RuleParser {
            media,
            sheet: &mut sheet,
            layer: None,
        };
        for result in RuleListParser::new_for_stylesheet(&mut parser, rules) {
            if let Err((_, skipped)) = result {
                debug!("skipped css rule {:?}", abbreviate(skipped));
            }
        }
        sheet
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Layer names in order of first appearance. Nested layers are
    /// dot-joined (`base.reset`).
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn abbreviate(css: &str) -> &str {
    let css = css.trim();
    match css.char_indices().nth(80) {
        Some((end, _)) => &css[..end],
        None => css,
    }
}

struct RuleParser<'a> {
    media: &'a MediaContext,
    sheet: &'a mut StyleSheet,
    layer: Option<usize>,
}

impl RuleParser<'_> {
    fn register_layer(&mut self, name: &str) -> usize {
        let full = match self.layer.and_then(|i| self.sheet.layers.get(i)) {
            Some(parent) => format!("{parent}.{name}"),
            None => name.to_string(),
        };
        match self.sheet.layers.iter().position(|l| *l == full) {
            Some(i) => i,
            None => {
                self.sheet.layers.push(full);
                self.sheet.layers.len() - 1
            }
        }
    }
}

enum BlockPrelude {
    Rules { layer: Option<usize> },
    Skip,
}

impl<'a, 'i> AtRuleParser<'i> for RuleParser<'a> {
    type PreludeNoBlock = ();
    type PreludeBlock = BlockPrelude;
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<AtRuleType<(), BlockPrelude>, ParseError<'i, ()>> {
        let start = input.position();
        while input.next().is_ok() {}
        let prelude = input.slice_from(start).trim();
        let enabled = |on: bool, layer| if on { BlockPrelude::Rules { layer } } else { BlockPrelude::Skip };

        Ok(match name.to_ascii_lowercase().as_str() {
            "media" => AtRuleType::WithBlock(enabled(self.media.matches(prelude), self.layer)),
            "supports" => AtRuleType::WithBlock(enabled(supports(prelude), self.layer)),
            "layer" => {
                let names: Vec<&str> = prelude
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .collect();
                match names.as_slice() {
                    [] => {
                        let anonymous = format!("<anonymous {}>", self.sheet.layers.len());
                        let layer = self.register_layer(&anonymous);
                        AtRuleType::WithBlock(BlockPrelude::Rules { layer: Some(layer) })
                    }
                    // `@layer name;` also lands here: the name is registered
                    // and the missing block is reported as a skipped rule
                    [name] => {
                        let layer = self.register_layer(name);
                        AtRuleType::WithBlock(BlockPrelude::Rules { layer: Some(layer) })
                    }
                    many => {
                        for name in many {
                            self.register_layer(name);
                        }
                        AtRuleType::WithoutBlock(())
                    }
                }
            }
            "import" | "namespace" | "charset" => AtRuleType::WithoutBlock(()),
            _ => AtRuleType::WithBlock(BlockPrelude::Skip),
        })
    }

    fn rule_without_block(&mut self, _prelude: (), _location: SourceLocation) {}

    fn parse_block<'t>(
        &mut self,
        prelude: BlockPrelude,
        _location: SourceLocation,
        input: &mut Parser<'i, 't>,
    ) -> Result<(), ParseError<'i, ()>> {
        match prelude {
            BlockPrelude::Rules { layer } => {
                let nested = RuleParser {
                    media: self.media,
                    sheet: &mut *self.sheet,
                    layer,
                };
                for result in RuleListParser::new_for_nested_rule(input, nested) {
                    if let Err((_, skipped)) = result {
                        debug!("skipped nested css rule {:?}", abbreviate(skipped));
                    }
                }
            }
            BlockPrelude::Skip => while input.next().is_ok() {},
        }
        Ok(())
    }
}

impl<'a, 'i> QualifiedRuleParser<'i> for RuleParser<'a> {
    type Prelude = Vec<Selector>;
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(&mut self, input: &mut Parser<'i, 't>) -> Result<Vec<Selector>, ParseError<'i, ()>> {
        let selectors: Vec<Selector> = input
            .parse_comma_separated(one_selector)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        if selectors.is_empty() {
            return Err(input.new_custom_error(()));
        }
        Ok(selectors)
    }

    fn parse_block<'t>(
        &mut self,
        selectors: Vec<Selector>,
        _location: SourceLocation,
        input: &mut Parser<'i, 't>,
    ) -> Result<(), ParseError<'i, ()>> {
        let declarations = declaration_list(input);
        if !declarations.is_empty() {
            self.sheet.rules.push(StyleRule {
                selectors,
                declarations,
                layer: self.layer,
            });
        }
        Ok(())
    }
}

/// One entry of a selector list; `None` when it does not parse.
fn one_selector<'i>(input: &mut Parser<'i, '_>) -> Result<Option<Selector>, ParseError<'i, ()>> {
    let start = input.position();
    while input.next().is_ok() {}
    let text = input.slice_from(start);
    let selector = Selector::parse(text);
    if selector.is_none() {
        debug!("dropped selector {:?}", text.trim());
    }
    Ok(selector)
}

/// Parse the inside of a `{ ... }` block, or a `style` attribute.
pub(crate) fn parse_declarations(block: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(block);
    let mut parser = Parser::new(&mut input);
    declaration_list(&mut parser)
}

fn declaration_list(input: &mut Parser<'_, '_>) -> Vec<Declaration> {
    let mut out = Vec::new();
    for result in DeclarationListParser::new(input, DeclarationCollector) {
        match result {
            Ok(declarations) => out.extend(declarations),
            Err((_, skipped)) => debug!("skipped declaration {:?}", abbreviate(skipped)),
        }
    }
    out
}

struct DeclarationCollector;

impl<'i> DeclarationParser<'i> for DeclarationCollector {
    type Declaration = Vec<Declaration>;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Vec<Declaration>, ParseError<'i, ()>> {
        let name = if name.starts_with("--") {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        };
        let (value, important) = declaration_value(input);
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }
        let mut out = Vec::new();
        expand_shorthand(&name, value, important, &mut out);
        Ok(out)
    }
}

impl<'i> AtRuleParser<'i> for DeclarationCollector {
    type PreludeNoBlock = ();
    type PreludeBlock = ();
    type AtRule = Vec<Declaration>;
    type Error = ();
}

/// The value text of a declaration and whether it ends in `!important`.
/// Consumes the whole input.
fn declaration_value<'i>(input: &mut Parser<'i, '_>) -> (&'i str, bool) {
    let start = input.position();
    let mut end = start;
    let mut important = false;
    loop {
        if input.try_parse(parse_important).is_ok() {
            important = input.is_exhausted();
            if !important {
                end = input.position();
            }
            continue;
        }
        match input.next_including_whitespace() {
            Ok(&Token::WhiteSpace(_)) => {}
            Ok(&Token::Function(_))
            | Ok(&Token::ParenthesisBlock)
            | Ok(&Token::SquareBracketBlock)
            | Ok(&Token::CurlyBracketBlock) => {
                skip_block(input);
                end = input.position();
            }
            Ok(_) => end = input.position(),
            Err(_) => break,
        }
    }
    (input.slice(start..end).trim(), important)
}

/// Consume the block whose opening token was just returned.
fn skip_block(input: &mut Parser<'_, '_>) {
    let _ = input.parse_nested_block(|p| {
        while p.next().is_ok() {}
        Ok::<_, ParseError<'_, ()>>(())
    });
}

/// Whitespace-separated component values, keeping function calls such as
/// `rgb(1, 2, 3)` in one piece.
fn split_tokens(value: &str) -> Vec<&str> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut parts = Vec::new();
    loop {
        parser.skip_whitespace();
        let start = parser.position();
        let opens_block = match parser.next() {
            Ok(token) => matches!(
                token,
                Token::Function(_)
                    | Token::ParenthesisBlock
                    | Token::SquareBracketBlock
                    | Token::CurlyBracketBlock
            ),
            Err(_) => break,
        };
        if opens_block {
            skip_block(&mut parser);
        }
        parts.push(parser.slice_from(start));
    }
    parts
}

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

const BORDER_STYLES: &[&str] = &[
    "none", "hidden", "dotted", "dashed", "solid", "double", "groove", "ridge", "inset",
    "outset",
];

const BACKGROUND_KEYWORDS: &[&str] = &[
    "repeat", "repeat-x", "repeat-y", "no-repeat", "space", "round", "scroll", "fixed",
    "local", "center", "top", "bottom", "left", "right", "cover", "contain", "border-box",
    "padding-box", "content-box", "/",
];

/// Expand `top right bottom left` box notation with 1-4 values.
fn box_values(value: &str) -> Option<[String; 4]> {
    let tokens = split_tokens(value);
    let v: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    match v.len() {
        1 => Some([v[0].clone(), v[0].clone(), v[0].clone(), v[0].clone()]),
        2 => Some([v[0].clone(), v[1].clone(), v[0].clone(), v[1].clone()]),
        3 => Some([v[0].clone(), v[1].clone(), v[2].clone(), v[1].clone()]),
        4 => Some([v[0].clone(), v[1].clone(), v[2].clone(), v[3].clone()]),
        _ => None,
    }
}

/// Lengths, percentages, `calc()` and the border-width keywords.
fn is_length_token(component: &str) -> bool {
    let mut input = ParserInput::new(component);
    let mut parser = Parser::new(&mut input);
    match parser.next() {
        Ok(Token::Dimension { .. }) | Ok(Token::Percentage { .. }) => true,
        Ok(Token::Number { value, .. }) => *value == 0.0,
        Ok(Token::Ident(word)) => matches!(
            word.to_ascii_lowercase().as_str(),
            "thin" | "medium" | "thick"
        ),
        Ok(Token::Function(name)) => name.eq_ignore_ascii_case("calc"),
        _ => false,
    }
}

/// Split a border or outline shorthand into width, style and color.
fn line_parts(value: &str) -> (&str, &str, &str) {
    let (mut width, mut style, mut color) = ("medium", "none", "currentcolor");
    for token in split_tokens(value) {
        if BORDER_STYLES.contains(&token.to_ascii_lowercase().as_str()) {
            style = token;
        } else if is_length_token(token) {
            width = token;
        } else {
            color = token;
        }
    }
    (width, style, color)
}

/// Push the longhand declarations for `name: value`. Properties that are not
/// shorthands are pushed unchanged.
pub(crate) fn expand_shorthand(name: &str, value: &str, important: bool, out: &mut Vec<Declaration>) {
    let push = |out: &mut Vec<Declaration>, n: &str, v: &str| {
        out.push(Declaration::new(n, v, important));
    };

    match name {
        "margin" | "padding" => {
            if let Some(vals) = box_values(value) {
                for (side, v) in SIDES.iter().zip(vals.iter()) {
                    push(out, &format!("{name}-{side}"), v);
                }
            }
        }
        "border-width" | "border-style" | "border-color" => {
            let part = &name["border-".len()..];
            if let Some(vals) = box_values(value) {
                for (side, v) in SIDES.iter().zip(vals.iter()) {
                    push(out, &format!("border-{side}-{part}"), v);
                }
            }
        }
        "border" | "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let (width, style, color) = line_parts(value);
            let sides: Vec<&str> = if name == "border" {
                SIDES.to_vec()
            } else {
                vec![&name["border-".len()..]]
            };
            for side in sides {
                push(out, &format!("border-{side}-width"), width);
                push(out, &format!("border-{side}-style"), style);
                push(out, &format!("border-{side}-color"), color);
            }
        }
        "outline" => {
            let (width, style, color) = line_parts(value);
            push(out, "outline-width", width);
            push(out, "outline-style", style);
            push(out, "outline-color", color);
        }
        "background" => {
            let mut image = "none".to_string();
            let mut color = "transparent".to_string();
            for token in split_tokens(value) {
                let lower = token.to_ascii_lowercase();
                if lower.starts_with("url(") || lower.contains("gradient(") {
                    image = token.to_string();
                } else if lower == "none"
                    || BACKGROUND_KEYWORDS.contains(&lower.as_str())
                    || is_length_token(token)
                {
                    continue;
                } else {
                    color = token.to_string();
                }
            }
            push(out, "background-color", &color);
            push(out, "background-image", &image);
        }
        _ => push(out, name, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules_and_skips_unknown_at_rules() {
        let css = r#"
            @import url("x.css");
            /* comment { not a rule } */
            @font-face { font-family: X; src: url(x.woff) }
            @media print { .hidden { display: none } }
            .a, div > p { color: red; background: #fff !important }
            .b:hover { color: blue }
        "#;
        let sheet = StyleSheet::parse(css);
        assert_eq!(sheet.len(), 1);
        let rule = &sheet.rules()[0];
        assert_eq!(rule.selectors.len(), 2);
        assert_eq!(rule.layer, None);
        assert_eq!(rule.declarations[0], Declaration::new("color", "red", false));
        assert_eq!(
            rule.declarations[1],
            Declaration::new("background-color", "#fff", true)
        );
    }

    #[test]
    fn matching_media_and_supports_blocks_contribute_rules() {
        let css = r#"
            @media screen and (min-width: 640px) { .wide { width: 10px } }
            @media (max-width: 639px) { .narrow { width: 20px } }
            @supports (display: grid) { .grid { display: grid } }
            @supports not (display: grid) { .fallback { display: block } }
            @media screen { @supports (color: red) { .both { color: red } } }
        "#;
        let sheet = StyleSheet::parse(css);
        let names: Vec<&str> = sheet
            .rules()
            .iter()
            .map(|r| r.declarations[0].name.as_str())
            .collect();
        assert_eq!(names, vec!["width", "display", "color"]);
        assert_eq!(sheet.rules()[0].declarations[0].value, "10px");

        let phone = MediaContext {
            width: 375.0,
            height: 812.0,
        };
        let narrow = StyleSheet::parse_for(css, &phone);
        assert_eq!(narrow.rules()[0].declarations[0].value, "20px");
    }

    #[test]
    fn layers_are_recorded_in_first_appearance_order() {
        let css = r#"
            @layer theme, base;
            @layer base { html { color: black } }
            @layer utilities { .t { color: red } }
            @layer theme { @layer dark { .x { color: white } } }
            @layer { .anon { color: gray } }
            .plain { color: blue }
        "#;
        let sheet = StyleSheet::parse(css);
        assert_eq!(
            sheet.layers(),
            &["theme", "base", "utilities", "theme.dark", "<anonymous 4>"]
        );
        let layers: Vec<Option<usize>> = sheet.rules().iter().map(|r| r.layer).collect();
        assert_eq!(layers, vec![Some(1), Some(2), Some(3), Some(4), None]);
    }

    #[test]
    fn unmatchable_selectors_are_dropped_individually() {
        let sheet = StyleSheet::parse("*, ::before, ::after { border-width: 0 } a:hover, a:focus { color: red }");
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.rules()[0].selectors.len(), 1);
    }

    #[test]
    fn declarations_keep_semicolons_inside_functions() {
        let decls = parse_declarations("background-image: url(data:image/png;base64,AAA=); color: red");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].value, "url(data:image/png;base64,AAA=)");
    }

    #[test]
    fn invalid_declarations_are_skipped_and_the_rest_kept() {
        let decls = parse_declarations("color red; width: 10px !important; : x; height: var(--h)");
        assert_eq!(
            decls,
            vec![
                Declaration::new("width", "10px", true),
                Declaration::new("height", "var(--h)", false),
            ]
        );
    }

    #[test]
    fn border_shorthand_assigns_tokens_by_shape() {
        let decls = parse_declarations("border-bottom: 2px solid oklch(0.9 0.01 250)");
        assert_eq!(
            decls,
            vec![
                Declaration::new("border-bottom-width", "2px", false),
                Declaration::new("border-bottom-style", "solid", false),
                Declaration::new("border-bottom-color", "oklch(0.9 0.01 250)", false),
            ]
        );
    }

    #[test]
    fn custom_property_names_keep_case() {
        let decls = parse_declarations("--Brand-Color: #123; COLOR: var(--Brand-Color)");
        assert_eq!(decls[0].name, "--Brand-Color");
        assert_eq!(decls[1].name, "color");
    }

    #[test]
    fn tokens_keep_functions_whole() {
        assert_eq!(
            split_tokens("1px solid rgb(1, 2, 3)"),
            vec!["1px", "solid", "rgb(1, 2, 3)"]
        );
    }
}
