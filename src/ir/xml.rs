//! Shared helpers for the XML-based readers and writers.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use roxmltree::{Document, Node};

use crate::error::EcgError;

/// Error context for one XML document.
#[derive(Clone, Copy, Debug)]
pub(crate) struct XmlContext<'p> {
    pub format: &'static str,
    pub path: &'p Path,
}

impl<'p> XmlContext<'p> {
    pub fn new(format: &'static str, path: &'p Path) -> Self {
        Self { format, path }
    }

    pub fn error(&self, message: impl Into<String>) -> EcgError {
        EcgError::FormatParse {
            format: self.format,
            path: self.path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn parse<'input>(&self, xml: &'input str) -> Result<Document<'input>, EcgError> {
        Document::parse(xml).map_err(|source| EcgError::XmlParse {
            path: PathBuf::from(self.path),
            source,
        })
    }

    pub fn required_child<'a, 'input>(
        &self,
        node: Node<'a, 'input>,
        tag: &str,
    ) -> Result<Node<'a, 'input>, EcgError> {
        child_element(node, tag).ok_or_else(|| {
            self.error(format!(
                "missing <{}> in <{}>",
                tag,
                node.tag_name().name()
            ))
        })
    }

    pub fn required_text(&self, node: Node<'_, '_>, tag: &str) -> Result<String, EcgError> {
        child_text(node, tag).ok_or_else(|| {
            self.error(format!(
                "missing <{}> in <{}>",
                tag,
                node.tag_name().name()
            ))
        })
    }

    pub fn required_number<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        tag: &str,
    ) -> Result<T, EcgError> {
        let raw = self.required_text(node, tag)?;
        parse_number(&raw).ok_or_else(|| self.error(format!("invalid <{tag}> value '{raw}'")))
    }

    pub fn required_attr<'a>(&self, node: Node<'a, '_>, attr: &str) -> Result<&'a str, EcgError> {
        node.attribute(attr).ok_or_else(|| {
            self.error(format!(
                "missing '{}' attribute in <{}>",
                attr,
                node.tag_name().name()
            ))
        })
    }

    pub fn number_attr<T: FromStr>(&self, node: Node<'_, '_>, attr: &str) -> Result<T, EcgError> {
        let raw = self.required_attr(node, attr)?;
        parse_number(raw).ok_or_else(|| {
            self.error(format!(
                "invalid '{}' value '{}' in <{}>",
                attr,
                raw,
                node.tag_name().name()
            ))
        })
    }
}

pub(crate) fn child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

pub(crate) fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

/// First element named `tag` anywhere below `node`.
pub(crate) fn find_descendant<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

pub(crate) fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag).and_then(element_text)
}

/// Trimmed text of an element, `None` when blank.
pub(crate) fn element_text(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

pub(crate) fn parse_number<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

/// Decodes base64 text holding little-endian `i16` samples.
pub(crate) fn decode_base64_i16_le(text: &str) -> Result<Vec<i32>, String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| format!("invalid base64 sample data: {err}"))?;
    if bytes.len() % 2 != 0 {
        return Err(format!(
            "decoded sample data has odd length {}",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32)
        .collect())
}

/// Parses integers separated by commas and/or whitespace.
pub(crate) fn parse_int_list(text: &str) -> Result<Vec<i32>, String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<i32>()
                .map_err(|_| format!("invalid sample value '{token}'"))
        })
        .collect()
}

pub(crate) fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_base64_samples() {
        // [1, -1, 256] as little-endian i16
        let encoded = STANDARD.encode([0x01, 0x00, 0xFF, 0xFF, 0x00, 0x01]);
        assert_eq!(decode_base64_i16_le(&encoded).unwrap(), vec![1, -1, 256]);
    }

    #[test]
    fn base64_ignores_embedded_whitespace() {
        let encoded = STANDARD.encode([0x02, 0x00, 0x03, 0x00]);
        let wrapped = format!("{}\n  {}", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_base64_i16_le(&wrapped).unwrap(), vec![2, 3]);
    }

    #[test]
    fn int_list_accepts_mixed_separators() {
        assert_eq!(parse_int_list("1, -2 3\n4").unwrap(), vec![1, -2, 3, 4]);
        assert!(parse_int_list("1,x").is_err());
    }

    #[test]
    fn child_text_is_trimmed() {
        let doc = Document::parse("<a><b>  42 </b><c/></a>").unwrap();
        let root = doc.root_element();
        assert_eq!(child_text(root, "b").as_deref(), Some("42"));
        assert_eq!(child_text(root, "c"), None);
        assert_eq!(parse_number::<u32>(" 42 "), Some(42));
    }
}
