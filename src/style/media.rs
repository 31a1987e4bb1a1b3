//! `@media` and `@supports` conditions.
//!
//! Exports render on screen media at a fixed viewport, so media queries are
//! answered once at parse time rather than re-evaluated on resize.

use cssparser::{ParseError, Parser, ParserInput, Token};

use super::properties::lookup;

// the export viewport: an A4 sheet at 96 dpi
const VIEWPORT_WIDTH_PX: f32 = 794.0;
const VIEWPORT_HEIGHT_PX: f32 = 1123.0;
const REM_PX: f32 = 16.0;

/// The environment media queries are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaContext {
    pub width: f32,
    pub height: f32,
}

impl Default for MediaContext {
    /// A screen the width of the export viewport.
    fn default() -> Self {
        Self {
            width: VIEWPORT_WIDTH_PX,
            height: VIEWPORT_HEIGHT_PX,
        }
    }
}

impl MediaContext {
    /// Whether a media query list matches. An empty list matches.
    pub fn matches(&self, query_list: &str) -> bool {
        let mut input = ParserInput::new(query_list);
        let mut parser = Parser::new(&mut input);
        if parser.is_exhausted() {
            return true;
        }
        let queries = parser.parse_comma_separated(|p| Ok::<_, ParseError<'_, ()>>(self.query(p)));
        queries.map_or(false, |q| q.into_iter().any(|m| m))
    }

    fn query(&self, input: &mut Parser<'_, '_>) -> bool {
        let mut negate = false;
        let mut matched = true;
        if let Ok(word) = input.try_parse(|p| p.expect_ident_cloned()) {
            let mut media_type = word.to_ascii_lowercase();
            if media_type == "not" || media_type == "only" {
                negate = media_type == "not";
                media_type = match input.try_parse(|p| p.expect_ident_cloned()) {
                    Ok(t) => t.to_ascii_lowercase(),
                    // `not (hover: none)`
                    Err(_) => "all".to_string(),
                };
            }
            matched = matches!(media_type.as_str(), "all" | "screen");
        }

        let mut disjunction = false;
        loop {
            let token = match input.next() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };
            match token {
                Token::Ident(ref word) if word.eq_ignore_ascii_case("and") => {}
                Token::Ident(ref word) if word.eq_ignore_ascii_case("or") => disjunction = true,
                Token::ParenthesisBlock => {
                    let feature = input
                        .parse_nested_block(|p| Ok::<_, ParseError<'_, ()>>(self.feature(p)))
                        .unwrap_or(false);
                    matched = if disjunction {
                        matched || feature
                    } else {
                        matched && feature
                    };
                    disjunction = false;
                }
                _ => matched = false,
            }
        }
        matched != negate
    }

    /// One parenthesised media feature, plain (`min-width: 40rem`) or
    /// range (`width >= 640px`, `400px < width <= 800px`).
    fn feature(&self, input: &mut Parser<'_, '_>) -> bool {
        let mut parts: Vec<Part> = Vec::new();
        while let Ok(token) = input.next() {
            let part = match token {
                Token::Ident(name) => Part::Name(name.to_ascii_lowercase()),
                Token::Dimension { value, unit, .. } => Part::Value(length(*value, unit)),
                Token::Number { value, .. } => Part::Value(Some(*value)),
                Token::Colon => Part::Colon,
                Token::Delim('=') if matches!(parts.last(), Some(Part::Op(_))) => {
                    if let Some(Part::Op(op)) = parts.last_mut() {
                        op.push('=');
                    }
                    continue;
                }
                Token::Delim(c @ ('<' | '>' | '=')) => Part::Op(c.to_string()),
                _ => Part::Other,
            };
            parts.push(part);
        }

        match parts.as_slice() {
            [Part::Name(name)] => self.boolean(name),
            [Part::Name(name), Part::Colon, Part::Value(Some(v))] => self.plain(name, *v),
            [Part::Name(name), Part::Colon, Part::Name(keyword)] => self.keyword(name) == Some(keyword.as_str()),
            [Part::Name(name), Part::Op(op), Part::Value(Some(v))] => self.range(name, op, *v),
            [Part::Value(Some(v)), Part::Op(op), Part::Name(name)] => self.range(name, &flip(op), *v),
            [Part::Value(Some(low)), Part::Op(a), Part::Name(name), Part::Op(b), Part::Value(Some(high))] => {
                self.range(name, &flip(a), *low) && self.range(name, b, *high)
            }
            _ => false,
        }
    }

    fn dimension(&self, name: &str) -> Option<f32> {
        match name {
            "width" => Some(self.width),
            "height" => Some(self.height),
            _ => None,
        }
    }

    fn boolean(&self, name: &str) -> bool {
        self.dimension(name).map_or(false, |v| v > 0.0)
            || matches!(name, "color" | "hover" | "any-hover" | "pointer" | "any-pointer" | "scripting")
    }

    fn plain(&self, name: &str, v: f32) -> bool {
        match name.split_once('-') {
            Some(("min", feature)) => self.range(feature, ">=", v),
            Some(("max", feature)) => self.range(feature, "<=", v),
            _ => self.range(name, "=", v),
        }
    }

    fn keyword(&self, name: &str) -> Option<&'static str> {
        Some(match name {
            "orientation" if self.height >= self.width => "portrait",
            "orientation" => "landscape",
            "prefers-color-scheme" => "light",
            "prefers-reduced-motion" | "prefers-contrast" | "prefers-reduced-transparency" => {
                "no-preference"
            }
            "hover" | "any-hover" => "hover",
            "pointer" | "any-pointer" => "fine",
            "scripting" => "enabled",
            "display-mode" => "browser",
            "forced-colors" => "none",
            "color-gamut" => "srgb",
            _ => return None,
        })
    }

    fn range(&self, name: &str, op: &str, v: f32) -> bool {
        let Some(actual) = self.dimension(name) else {
            return false;
        };
        match op {
            "<" => actual < v,
            "<=" => actual <= v,
            ">" => actual > v,
            ">=" => actual >= v,
            "=" => (actual - v).abs() < f32::EPSILON,
            _ => false,
        }
    }
}

#[derive(Debug)]
enum Part {
    Name(String),
    Value(Option<f32>),
    Op(String),
    Colon,
    Other,
}

fn length(value: f32, unit: &str) -> Option<f32> {
    match unit.to_ascii_lowercase().as_str() {
        "px" => Some(value),
        "em" | "rem" => Some(value * REM_PX),
        "pt" => Some(value * 96.0 / 72.0),
        "in" => Some(value * 96.0),
        _ => None,
    }
}

fn flip(op: &str) -> String {
    match op {
        "<" => ">",
        "<=" => ">=",
        ">" => "<",
        ">=" => "<=",
        other => other,
    }
    .to_string()
}

/// Evaluate an `@supports` condition.
///
/// A declaration test passes when the property is one the engine computes,
/// or a custom property. Function tests such as `selector()` never pass.
pub fn supports(condition: &str) -> bool {
    let mut input = ParserInput::new(condition);
    let mut parser = Parser::new(&mut input);
    parser.parse_entirely(supports_condition).unwrap_or(false)
}

fn supports_condition<'i>(input: &mut Parser<'i, '_>) -> Result<bool, ParseError<'i, ()>> {
    if input.try_parse(|p| p.expect_ident_matching("not")).is_ok() {
        return supports_in_parens(input).map(|v| !v);
    }
    let mut result = supports_in_parens(input)?;
    loop {
        if input.try_parse(|p| p.expect_ident_matching("and")).is_ok() {
            let next = supports_in_parens(input)?;
            result = result && next;
        } else if input.try_parse(|p| p.expect_ident_matching("or")).is_ok() {
            let next = supports_in_parens(input)?;
            result = result || next;
        } else {
            return Ok(result);
        }
    }
}

fn supports_in_parens<'i>(input: &mut Parser<'i, '_>) -> Result<bool, ParseError<'i, ()>> {
    match input.next()?.clone() {
        Token::ParenthesisBlock => input.parse_nested_block(|p| -> Result<bool, ParseError<'i, ()>> {
            let nested = p.try_parse(|p| -> Result<bool, ParseError<'i, ()>> {
                let v = supports_condition(p)?;
                p.expect_exhausted()?;
                Ok(v)
            });
            if let Ok(v) = nested {
                return Ok(v);
            }
            let name = p.expect_ident_cloned()?;
            p.expect_colon()?;
            while p.next().is_ok() {}
            Ok(name.starts_with("--") || lookup(&name.to_ascii_lowercase()).is_some())
        }),
        Token::Function(_) => input.parse_nested_block(|p| -> Result<bool, ParseError<'i, ()>> {
            while p.next().is_ok() {}
            Ok(false)
        }),
        _ => Err(input.new_custom_error(())),
    }
}
