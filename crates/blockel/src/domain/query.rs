//! Selector parsing, matching, and identifier escaping.
//!
//! Supports the grammar the synthesizer emits: compound selectors made of an
//! optional tag (or `*`), `#id`, `.class`, and `:nth-of-type(n)` parts, joined by
//! child (`>`) or descendant (whitespace) combinators.

use std::fmt::Write as _;

use crate::domain::dom::{Document, NodeId};
use crate::domain::errors::SelectorParseError;

/// Escape `value` for use as a CSS identifier, following `CSS.escape()`.
pub fn escape_identifier(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());

    for (index, &ch) in chars.iter().enumerate() {
        let code = ch as u32;
        if code == 0 {
            escaped.push('\u{FFFD}');
        } else if (0x01..=0x1f).contains(&code)
            || code == 0x7f
            || (index == 0 && ch.is_ascii_digit())
            || (index == 1 && ch.is_ascii_digit() && chars[0] == '-')
        {
            let _ = write!(escaped, "\\{code:x} ");
        } else if index == 0 && chars.len() == 1 && ch == '-' {
            escaped.push_str("\\-");
        } else if code >= 0x80 || ch == '-' || ch == '_' || ch.is_ascii_alphanumeric() {
            escaped.push(ch);
        } else {
            escaped.push('\\');
            escaped.push(ch);
        }
    }

    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Child,
    Descendant,
}

/// One compound selector, e.g. `div#main.card:nth-of-type(2)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    nth_of_type: Vec<usize>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.ids.is_empty()
            && self.classes.is_empty()
            && self.nth_of_type.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag_name(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|expected| expected != tag) {
            return false;
        }
        if self.ids.iter().any(|id| doc.id(node) != Some(id.as_str())) {
            return false;
        }
        if !self
            .classes
            .iter()
            .all(|class| doc.classes(node).any(|token| token == class))
        {
            return false;
        }
        if self.nth_of_type.is_empty() {
            return true;
        }
        let position = type_position(doc, node);
        self.nth_of_type.iter().all(|nth| *nth == position)
    }
}

/// 1-based position of `node` among its parent's children sharing its tag.
pub fn type_position(doc: &Document, node: NodeId) -> usize {
    let Some(parent) = doc.parent_element(node) else {
        return 1;
    };
    let tag = doc.tag_name(node);
    doc.children(parent)
        .iter()
        .filter(|sibling| doc.tag_name(**sibling) == tag)
        .position(|sibling| *sibling == node)
        .map_or(1, |index| index + 1)
}

/// A parsed complex selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` to `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorParseError> {
        Parser::new(input).parse()
    }

    /// Whether the connected element `node` matches this selector.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_connected(node) && self.matches_at(doc, node, self.compounds.len() - 1)
    }

    fn matches_at(&self, doc: &Document, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(doc, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => doc
                .parent_element(node)
                .is_some_and(|parent| self.matches_at(doc, parent, index - 1)),
            Combinator::Descendant => doc
                .ancestors(node)
                .into_iter()
                .any(|ancestor| self.matches_at(doc, ancestor, index - 1)),
        }
    }
}

impl Document {
    /// All connected elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorParseError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select(&selector))
    }

    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.trim_matches(is_css_whitespace).char_indices().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Selector, SelectorParseError> {
        if self.chars.is_empty() {
            return Err(SelectorParseError::Empty);
        }

        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        loop {
            let saw_whitespace = self.skip_whitespace();
            let combinator = match self.peek() {
                None => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if saw_whitespace => Combinator::Descendant,
                Some(found) => return Err(self.unexpected(found)),
            };
            if self.peek().is_none() {
                return Err(SelectorParseError::DanglingCombinator);
            }
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }

        Ok(Selector {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Result<Compound, SelectorParseError> {
        let mut compound = Compound::default();
        let mut universal = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                universal = true;
            }
            Some(ch) if starts_identifier(ch) => {
                compound.tag = Some(self.identifier().to_ascii_lowercase());
            }
            _ => {}
        }

        while let Some(ch) = self.peek() {
            match ch {
                '#' => {
                    self.pos += 1;
                    let id = self.required_identifier()?;
                    compound.ids.push(id);
                }
                '.' => {
                    self.pos += 1;
                    let class = self.required_identifier()?;
                    compound.classes.push(class);
                }
                ':' => {
                    self.pos += 1;
                    let name = self.required_identifier()?;
                    if !name.eq_ignore_ascii_case("nth-of-type") {
                        return Err(SelectorParseError::UnsupportedPseudo(name));
                    }
                    compound.nth_of_type.push(self.nth_argument()?);
                }
                ch if ch == '>' || is_css_whitespace(ch) => break,
                found => return Err(self.unexpected(found)),
            }
        }

        if compound.is_empty() && !universal {
            return match self.peek() {
                Some(found) => Err(self.unexpected(found)),
                None => Err(SelectorParseError::DanglingCombinator),
            };
        }
        Ok(compound)
    }

    fn nth_argument(&mut self) -> Result<usize, SelectorParseError> {
        match self.peek() {
            Some('(') => self.pos += 1,
            Some(found) => return Err(self.unexpected(found)),
            None => return Err(SelectorParseError::InvalidNth(String::new())),
        }
        let mut argument = String::new();
        loop {
            match self.peek() {
                Some(')') => {
                    self.pos += 1;
                    break;
                }
                Some(ch) => {
                    argument.push(ch);
                    self.pos += 1;
                }
                None => return Err(SelectorParseError::InvalidNth(argument)),
            }
        }
        match argument.trim_matches(is_css_whitespace).parse::<usize>() {
            Ok(nth) if nth > 0 => Ok(nth),
            _ => Err(SelectorParseError::InvalidNth(argument)),
        }
    }

    fn required_identifier(&mut self) -> Result<String, SelectorParseError> {
        match self.peek() {
            Some(ch) if starts_identifier(ch) || ch.is_ascii_digit() => Ok(self.identifier()),
            Some(found) => Err(self.unexpected(found)),
            None => Err(SelectorParseError::DanglingCombinator),
        }
    }

    fn identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.pos += 1;
                ident.push(self.escape());
            } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || (ch as u32) >= 0x80 {
                ident.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        ident
    }

    /// Decode the escape following a consumed backslash.
    fn escape(&mut self) -> char {
        let Some(first) = self.peek() else {
            return '\u{FFFD}';
        };
        if !first.is_ascii_hexdigit() {
            self.pos += 1;
            return first;
        }

        let mut code = 0u32;
        let mut digits = 0;
        while digits < 6 {
            match self.peek().and_then(|ch| ch.to_digit(16)) {
                Some(value) => {
                    code = code * 16 + value;
                    digits += 1;
                    self.pos += 1;
                }
                None => break,
            }
        }
        if self.peek().is_some_and(is_css_whitespace) {
            self.pos += 1;
        }
        match char::from_u32(code) {
            Some(ch) if code != 0 => ch,
            _ => '\u{FFFD}',
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(is_css_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, ch)| *ch)
    }

    fn unexpected(&self, found: char) -> SelectorParseError {
        let offset = self.chars.get(self.pos).map_or(0, |(offset, _)| *offset);
        SelectorParseError::Unexpected { found, offset }
    }
}

/// Only these five count as whitespace in selectors; U+00A0 and friends are identifier text.
fn is_css_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

fn starts_identifier(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '-' || ch == '_' || ch == '\\' || (ch as u32) >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_follows_css_escape_rules() {
        assert_eq!(escape_identifier("main"), "main");
        assert_eq!(escape_identifier("1st"), "\\31 st");
        assert_eq!(escape_identifier("-2x"), "-\\32 x");
        assert_eq!(escape_identifier("-"), "\\-");
        assert_eq!(escape_identifier("a:b"), "a\\:b");
        assert_eq!(escape_identifier("w-[10px]"), "w-\\[10px\\]");
        assert_eq!(escape_identifier("x y"), "x\\ y");
        assert_eq!(escape_identifier("caf\u{e9}"), "caf\u{e9}");
        assert_eq!(escape_identifier("tab\there"), "tab\\9 here");
    }

    #[test]
    fn escaped_identifiers_parse_back_to_their_value() {
        for raw in ["1st", "-2x", "-", "a:b", "w-[10px]", "x y", "tab\there"] {
            let selector = Selector::parse(&format!("#{}", escape_identifier(raw))).unwrap();
            assert_eq!(selector.compounds[0].ids, vec![raw.to_string()], "{raw}");
        }
    }

    #[test]
    fn only_css_whitespace_separates_compounds() {
        let selector = Selector::parse(".ad\u{a0}").unwrap();
        assert_eq!(selector.compounds[0].classes, vec!["ad\u{a0}".to_string()]);

        let selector = Selector::parse("\u{a0}main").unwrap();
        assert_eq!(selector.compounds.len(), 1);
        assert_eq!(selector.compounds[0].tag.as_deref(), Some("\u{a0}main"));

        let selector = Selector::parse("\tul\x0c li\r\n").unwrap();
        assert_eq!(selector.combinators, vec![Combinator::Descendant]);
    }

    #[test]
    fn parses_child_chains_with_nth_of_type() {
        let selector = Selector::parse("div#app > ul.list.dense > li:nth-of-type(3)").unwrap();
        assert_eq!(selector.compounds.len(), 3);
        assert_eq!(selector.combinators, vec![Combinator::Child, Combinator::Child]);
        assert_eq!(selector.compounds[2].nth_of_type, vec![3]);
        assert_eq!(selector.compounds[1].classes, vec!["list", "dense"]);
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert_eq!(Selector::parse("   "), Err(SelectorParseError::Empty));
        assert_eq!(
            Selector::parse("div >"),
            Err(SelectorParseError::DanglingCombinator)
        );
        assert!(matches!(
            Selector::parse("a:hover"),
            Err(SelectorParseError::UnsupportedPseudo(name)) if name == "hover"
        ));
        assert!(matches!(
            Selector::parse("li:nth-of-type(0)"),
            Err(SelectorParseError::InvalidNth(_))
        ));
        assert!(matches!(
            Selector::parse("div[data-x]"),
            Err(SelectorParseError::Unexpected { found: '[', .. })
        ));
    }

    #[test]
    fn matches_child_and_descendant_combinators() {
        let mut doc = Document::new("https://example.com/").unwrap();
        let body = doc.body();
        let list = doc.append_element(body, "ul", &[("class", "menu")]);
        let first = doc.append_element(list, "li", &[]);
        let second = doc.append_element(list, "li", &[]);
        let link = doc.append_element(second, "a", &[("class", "cta")]);

        assert_eq!(doc.query_selector_all("ul.menu > li").unwrap(), vec![first, second]);
        assert_eq!(doc.query_selector_all("li:nth-of-type(2)").unwrap(), vec![second]);
        assert_eq!(doc.query_selector_all("body a.cta").unwrap(), vec![link]);
        assert!(doc.query_selector_all("body > a").unwrap().is_empty());
        assert_eq!(doc.query_selector_all("*").unwrap().len(), 7);
    }

    #[test]
    fn detached_elements_never_match() {
        let mut doc = Document::new("https://example.com/").unwrap();
        let body = doc.body();
        let banner = doc.append_element(body, "div", &[("id", "banner")]);
        doc.remove(banner);
        assert!(doc.query_selector_all("#banner").unwrap().is_empty());
    }
}
