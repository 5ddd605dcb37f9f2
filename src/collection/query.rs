use regex::{
    Regex,
    RegexBuilder,
};

use super::types::{
    Card,
    CardType,
    Note,
    NoteModel,
};
use crate::{
    core::ReorderError,
    segmentation::get_plain_text,
};

#[derive(Debug, Clone, PartialEq)]
enum QueryToken {
    Open,
    Close,
    Negate,
    And,
    Or,
    Term(String),
}

/// Parsed search query.
#[derive(Debug, Clone)]
pub enum SearchNode {
    All,
    /// Deck name pattern; sub-decks match too.
    Deck(Regex),
    NoteType(Regex),
    /// One-based template number.
    CardTemplate(u32),
    Tag(Regex),
    IsNew,
    IsReview,
    IsLearning,
    IsSuspended,
    NoteId(u64),
    CardId(u64),
    Text(String),
    Not(Box<SearchNode>),
    And(Vec<SearchNode>),
    Or(Vec<SearchNode>),
}

pub struct SearchContext<'a> {
    pub card: &'a Card,
    pub note: &'a Note,
    pub model: Option<&'a NoteModel>,
}

impl SearchNode {
    pub fn matches(&self, ctx: &SearchContext<'_>) -> bool {
        match self {
            SearchNode::All => true,
            SearchNode::Deck(pattern) => {
                deck_and_parents(&ctx.card.deck).any(|d| pattern.is_match(d))
            }
            SearchNode::NoteType(pattern) => ctx.model.is_some_and(|m| pattern.is_match(&m.name)),
            SearchNode::CardTemplate(number) => ctx.card.ordinal + 1 == *number,
            SearchNode::Tag(pattern) => ctx.note.tags.iter().any(|t| pattern.is_match(t)),
            SearchNode::IsNew => ctx.card.card_type == CardType::New,
            SearchNode::IsReview => {
                matches!(ctx.card.card_type, CardType::Review | CardType::Relearning)
            }
            SearchNode::IsLearning => {
                matches!(ctx.card.card_type, CardType::Learning | CardType::Relearning)
            }
            SearchNode::IsSuspended => ctx.card.suspended,
            SearchNode::NoteId(id) => ctx.note.id == *id,
            SearchNode::CardId(id) => ctx.card.id == *id,
            SearchNode::Text(text) => ctx
                .note
                .fields
                .iter()
                .any(|f| get_plain_text(&f.value).to_lowercase().contains(text.as_str())),
            SearchNode::Not(inner) => !inner.matches(ctx),
            SearchNode::And(nodes) => nodes.iter().all(|n| n.matches(ctx)),
            SearchNode::Or(nodes) => nodes.iter().any(|n| n.matches(ctx)),
        }
    }
}

/// `A::B::C` yields `A::B::C`, `A::B`, `A`.
fn deck_and_parents(deck: &str) -> impl Iterator<Item = &str> {
    let mut ends: Vec<usize> = deck.match_indices("::").map(|(i, _)| i).collect();
    ends.push(deck.len());
    ends.into_iter().rev().map(move |end| &deck[..end])
}

fn glob_pattern(value: &str) -> Result<Regex, ReorderError> {
    let escaped: Vec<String> = value.split('*').map(regex::escape).collect();
    RegexBuilder::new(&format!("^{}$", escaped.join(".*")))
        .case_insensitive(true)
        .build()
        .map_err(ReorderError::from)
}

fn invalid(query: &str, reason: &str) -> ReorderError {
    ReorderError::Configuration(format!("Invalid search query '{}': {}", query, reason))
}

fn lex(query: &str) -> Result<Vec<QueryToken>, ReorderError> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(QueryToken::Open);
            }
            ')' => {
                chars.next();
                tokens.push(QueryToken::Close);
            }
            '-' => {
                chars.next();
                tokens.push(QueryToken::Negate);
            }
            _ => {
                let mut term = String::new();
                let mut quoted = false;
                while let Some(&c) = chars.peek() {
                    if c == '"' {
                        chars.next();
                        quoted = true;
                        let mut closed = false;
                        for inner in chars.by_ref() {
                            if inner == '"' {
                                closed = true;
                                break;
                            }
                            term.push(inner);
                        }
                        if !closed {
                            return Err(invalid(query, "unterminated quote"));
                        }
                    } else if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    } else {
                        term.push(c);
                        chars.next();
                    }
                }

                match term.to_lowercase().as_str() {
                    "and" if !quoted => tokens.push(QueryToken::And),
                    "or" if !quoted => tokens.push(QueryToken::Or),
                    _ => tokens.push(QueryToken::Term(term)),
                }
            }
        }
    }

    Ok(tokens)
}

struct Parser<'q> {
    query: &'q str,
    tokens: Vec<QueryToken>,
    pos: usize,
}

impl<'q> Parser<'q> {
    fn peek(&self) -> Option<&QueryToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<QueryToken> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<SearchNode, ReorderError> {
        let mut nodes = vec![self.parse_and()?];
        while self.peek() == Some(&QueryToken::Or) {
            self.next();
            nodes.push(self.parse_and()?);
        }
        Ok(if nodes.len() == 1 { nodes.remove(0) } else { SearchNode::Or(nodes) })
    }

    fn parse_and(&mut self) -> Result<SearchNode, ReorderError> {
        let mut nodes = vec![self.parse_unary()?];
        loop {
            match self.peek() {
                None | Some(QueryToken::Or) | Some(QueryToken::Close) => break,
                Some(QueryToken::And) => {
                    self.next();
                    nodes.push(self.parse_unary()?);
                }
                Some(_) => nodes.push(self.parse_unary()?),
            }
        }
        Ok(if nodes.len() == 1 { nodes.remove(0) } else { SearchNode::And(nodes) })
    }

    fn parse_unary(&mut self) -> Result<SearchNode, ReorderError> {
        match self.next() {
            Some(QueryToken::Negate) => Ok(SearchNode::Not(Box::new(self.parse_unary()?))),
            Some(QueryToken::Open) => {
                let node = self.parse_or()?;
                match self.next() {
                    Some(QueryToken::Close) => Ok(node),
                    _ => Err(invalid(self.query, "missing closing parenthesis")),
                }
            }
            Some(QueryToken::Term(term)) => parse_term(self.query, &term),
            Some(token) => Err(invalid(self.query, &format!("unexpected {:?}", token))),
            None => Err(invalid(self.query, "unexpected end of query")),
        }
    }
}

fn parse_term(query: &str, term: &str) -> Result<SearchNode, ReorderError> {
    let Some((key, value)) = term.split_once(':') else {
        return Ok(SearchNode::Text(term.trim_matches('*').to_lowercase()));
    };

    let number = |value: &str| -> Result<u64, ReorderError> {
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(query, &format!("'{}' is not a number", term)))
    };

    match key.to_lowercase().as_str() {
        "deck" => Ok(SearchNode::Deck(glob_pattern(value)?)),
        "note" => Ok(SearchNode::NoteType(glob_pattern(value)?)),
        "tag" => Ok(SearchNode::Tag(glob_pattern(value)?)),
        "card" => Ok(SearchNode::CardTemplate(number(value)? as u32)),
        "nid" => Ok(SearchNode::NoteId(number(value)?)),
        "cid" => Ok(SearchNode::CardId(number(value)?)),
        "is" => match value.to_lowercase().as_str() {
            "new" => Ok(SearchNode::IsNew),
            "review" => Ok(SearchNode::IsReview),
            "learn" => Ok(SearchNode::IsLearning),
            "suspended" => Ok(SearchNode::IsSuspended),
            other => Err(invalid(query, &format!("unknown state 'is:{}'", other))),
        },
        _ => Ok(SearchNode::Text(term.trim_matches('*').to_lowercase())),
    }
}

/// Parses a search query. An empty query matches every card.
pub fn parse_query(query: &str) -> Result<SearchNode, ReorderError> {
    let tokens = lex(query)?;
    if tokens.is_empty() {
        return Ok(SearchNode::All);
    }

    let mut parser = Parser { query, tokens, pos: 0 };
    let node = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(invalid(query, "unbalanced parenthesis"));
    }
    Ok(node)
}

/// Quotes a value for use in a query, e.g. a deck name containing spaces.
pub fn quote(key: &str, value: &str) -> String {
    format!("\"{}:{}\"", key, value.replace('"', ""))
}
