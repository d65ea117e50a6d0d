//! Whole-string parsers for set and map text.
//!
//! These split `[params] -> { Name[dims] -> Name[dims] : constraints }`
//! into its delimiter-bounded pieces without interpreting the affine
//! content.  Constraint pieces stay verbatim strings; transformations
//! append new pieces and the result is re-read by the backend.  Missing
//! delimiters are parse errors.

use crate::polyhedral::parse::is_identifier;
use crate::utils::errors::{ParseError, ParseErrorKind, PolyResult};

use super::space_parser::SpaceParser;

/// Split a constraint list on `and` at word boundaries.
fn split_conjunction(src: &str) -> Vec<String> {
    fn is_word(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_'
    }
    let bytes = src.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 3 <= bytes.len() {
        let boundary_before = i == 0 || !is_word(bytes[i - 1]);
        let boundary_after = i + 3 == bytes.len() || !is_word(bytes[i + 3]);
        if &src[i..i + 3] == "and" && boundary_before && boundary_after {
            pieces.push(src[start..i].trim().to_string());
            start = i + 3;
            i += 3;
        } else {
            i += 1;
        }
    }
    pieces.push(src[start..].trim().to_string());
    pieces.retain(|p| !p.is_empty());
    pieces
}

/// Parse the optional `[N, M] ->` parameter prefix.
fn parse_param_prefix(prefix: &str, src: &str) -> PolyResult<Vec<String>> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Ok(Vec::new());
    }
    let stripped = prefix.strip_suffix("->").ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::MissingDelimiter,
            "parameter list must be followed by `->`",
            src,
        )
    })?;
    let stripped = stripped.trim();
    let inner = stripped
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::MissingDelimiter,
                "parameter list must be bracketed",
                src,
            )
        })?;
    let mut params = Vec::new();
    for piece in inner.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if !is_identifier(piece) {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                format!("invalid parameter name `{}`", piece),
                src,
            )
            .into());
        }
        params.push(piece.to_string());
    }
    Ok(params)
}

/// Parse one `Name[inner]` tuple; the name may be empty.
fn parse_tuple(text: &str, src: &str) -> PolyResult<(String, SpaceParser)> {
    let text = text.trim();
    let open = text.find('[').ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingDelimiter, "missing `[` in tuple", src)
    })?;
    let close = text.rfind(']').ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingDelimiter, "missing `]` in tuple", src)
    })?;
    if close < open {
        return Err(
            ParseError::new(ParseErrorKind::MissingDelimiter, "mismatched brackets", src).into(),
        );
    }
    let name = text[..open].trim().to_string();
    if !name.is_empty() && !is_identifier(&name) {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            format!("invalid tuple name `{}`", name),
            src,
        )
        .into());
    }
    Ok((name, SpaceParser::new(&text[open + 1..close])))
}

/// Extract the `{ ... }` body and the parameter prefix.
fn split_body(src: &str) -> PolyResult<(Vec<String>, &str)> {
    let open = src.find('{').ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingDelimiter, "missing `{`", src)
    })?;
    let close = src.rfind('}').ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingDelimiter, "missing `}`", src)
    })?;
    if close < open {
        return Err(
            ParseError::new(ParseErrorKind::MissingDelimiter, "mismatched braces", src).into(),
        );
    }
    let params = parse_param_prefix(&src[..open], src)?;
    Ok((params, &src[open + 1..close]))
}

/// The delimiter-level pieces of a map string.
#[derive(Debug, Clone)]
pub struct MapParser {
    pub parameters: Vec<String>,
    pub domain_name: String,
    pub range_name: String,
    pub domain: SpaceParser,
    pub range: SpaceParser,
    pub constraints: Vec<String>,
}

impl MapParser {
    pub fn parse(src: &str) -> PolyResult<MapParser> {
        let (parameters, body) = split_body(src)?;
        let (head, tail) = match body.find(':') {
            Some(i) => (&body[..i], Some(&body[i + 1..])),
            None => (body, None),
        };
        let arrow = head.find("->").ok_or_else(|| {
            ParseError::new(ParseErrorKind::MissingDelimiter, "map requires `->`", src)
        })?;
        let (domain_name, domain) = parse_tuple(&head[..arrow], src)?;
        let (range_name, range) = parse_tuple(&head[arrow + 2..], src)?;
        let constraints = tail.map(split_conjunction).unwrap_or_default();
        Ok(MapParser {
            parameters,
            domain_name,
            range_name,
            domain,
            range,
            constraints,
        })
    }

    pub fn add_constraint(&mut self, constraint: impl Into<String>) {
        self.constraints.push(constraint.into());
    }

    /// Re-serialize into canonical map text.
    pub fn get_str(&self) -> String {
        let mut out = String::new();
        if !self.parameters.is_empty() {
            out.push_str(&format!("[{}] -> ", self.parameters.join(", ")));
        }
        out.push_str(&format!(
            "{{ {}[{}] -> {}[{}]",
            self.domain_name,
            self.domain.get_str(),
            self.range_name,
            self.range.get_str()
        ));
        let mut pieces: Vec<String> = Vec::new();
        pieces.extend(self.constraints.iter().cloned());
        pieces.extend(self.domain.constraints().iter().cloned());
        pieces.extend(self.range.constraints().iter().cloned());
        if !pieces.is_empty() {
            out.push_str(&format!(" : {}", pieces.join(" and ")));
        }
        out.push_str(" }");
        out
    }
}

/// The delimiter-level pieces of a set string.
#[derive(Debug, Clone)]
pub struct SetParser {
    pub parameters: Vec<String>,
    pub name: String,
    pub space: SpaceParser,
    pub constraints: Vec<String>,
}

impl SetParser {
    pub fn parse(src: &str) -> PolyResult<SetParser> {
        let (parameters, body) = split_body(src)?;
        let (head, tail) = match body.find(':') {
            Some(i) => (&body[..i], Some(&body[i + 1..])),
            None => (body, None),
        };
        if head.contains("->") {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                "expected a set, found a map",
                src,
            )
            .into());
        }
        let (name, mut space) = parse_tuple(head, src)?;
        space.fold_expressions();
        let constraints = tail.map(split_conjunction).unwrap_or_default();
        Ok(SetParser {
            parameters,
            name,
            space,
            constraints,
        })
    }

    /// Re-serialize into canonical set text.
    pub fn get_str(&self) -> String {
        let mut out = String::new();
        if !self.parameters.is_empty() {
            out.push_str(&format!("[{}] -> ", self.parameters.join(", ")));
        }
        out.push_str(&format!("{{ {}[{}]", self.name, self.space.get_str()));
        let mut pieces: Vec<String> = Vec::new();
        pieces.extend(self.constraints.iter().cloned());
        pieces.extend(self.space.constraints().iter().cloned());
        if !pieces.is_empty() {
            out.push_str(&format!(" : {}", pieces.join(" and ")));
        }
        out.push_str(" }");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_conjunction_word_boundaries() {
        let pieces = split_conjunction("0 <= rand_i and rand_i < operand");
        assert_eq!(pieces, vec!["0 <= rand_i", "rand_i < operand"]);
    }

    #[test]
    fn test_parse_map_pieces() {
        let p = MapParser::parse("[N] -> { S[i, j] -> [c0, j] : i = 2*c0 and 0 <= i < N }")
            .unwrap();
        assert_eq!(p.parameters, vec!["N"]);
        assert_eq!(p.domain_name, "S");
        assert_eq!(p.range_name, "");
        assert_eq!(p.domain.dimensions, vec!["i", "j"]);
        assert_eq!(p.range.dimensions, vec!["c0", "j"]);
        assert_eq!(p.constraints, vec!["i = 2*c0", "0 <= i < N"]);
    }

    #[test]
    fn test_round_trip_preserves_pieces() {
        let src = "[N] -> { S[i, j] -> [i, j] : 0 <= i < N and 0 <= j < 10 }";
        let p = MapParser::parse(src).unwrap();
        assert_eq!(p.get_str(), src);
    }

    #[test]
    fn test_missing_arrow_is_error() {
        assert!(MapParser::parse("{ S[i] [o] }").is_err());
        assert!(MapParser::parse("S[i] -> [o]").is_err());
    }

    #[test]
    fn test_set_parser() {
        let p = SetParser::parse("[N, M] -> { S[i, j] : 0 <= i < N and 0 <= j < M }").unwrap();
        assert_eq!(p.parameters, vec!["N", "M"]);
        assert_eq!(p.name, "S");
        assert_eq!(p.space.dimensions, vec!["i", "j"]);
        assert_eq!(p.constraints.len(), 2);
    }

    #[test]
    fn test_set_parser_rejects_map() {
        assert!(SetParser::parse("{ S[i] -> [o] }").is_err());
    }
}
