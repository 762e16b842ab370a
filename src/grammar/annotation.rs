//! The grammar annotation dialect.
//!
//! A grammar line is a sequence of space-delimited words. A word may carry
//! an annotation after its first `=`; the annotation is a `&`-separated list
//! of parts, each a keyword optionally followed by `:` and a value:
//!
//! ```text
//! vlan=LIST:vlan&KEYS:$id $id=NAME:name mtu $m=NAME:mtu&OPTIONAL
//! ```
//!
//! Words starting with `$` are parameters; everything else is literal device
//! text. A malformed annotation (unknown keyword, missing required value)
//! degrades the whole word to a plain literal.

/// Separator between annotation parts.
const PART_SEPARATOR: char = '&';
/// Separator between a keyword and its value.
const VALUE_SEPARATOR: char = ':';
/// Introduces the annotation on a word.
pub const ANNOTATION_INDICATOR: char = '=';
/// Marks a parameter word.
pub const PARAM_SIGIL: char = '$';
/// Separates key names inside `KEYS:`.
pub const KEY_SEPARATOR: char = '|';
/// Separates the position and the value inside `IF_NEXT_VAL:`.
const NEXT_VAL_SEPARATOR: char = '@';

/// Whether a fixed-value word may be negated with the `no` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegatePolicy {
    /// Emit the negated form whenever the value calls for it.
    Allow,
    /// Only emit the negated form when deleting.
    Skip,
}

/// The `IF_NEXT_VAL` guard: a 1-based token position and an expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextValueGuard {
    /// 1-based position of the guarded token on the remaining line.
    pub position: usize,
    /// Expected token text, or one of the `EMPTY` / `NOT_EMPTY` keywords.
    pub expected: String,
}

impl NextValueGuard {
    /// The token at the position must be absent.
    pub const EMPTY: &'static str = "EMPTY";
    /// The token at the position must be present, whatever its text.
    pub const NOT_EMPTY: &'static str = "NOT_EMPTY";
}

/// Parsed annotation of one grammar word.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    /// `NAME:` fact field this word captures into.
    pub name: Option<String>,
    /// `LIST:` collection this word opens.
    pub list: Option<String>,
    /// `KEYS:` identity fields of the collection, `$` stripped.
    pub keys: Vec<String>,
    /// `LIST_GROUP:` collection whose entries span several device lines.
    pub list_group: Option<String>,
    /// `INTERFACE_LIST` marker.
    pub interface_list: bool,
    /// `INTERFACE_PARAM` marker (two-token interface value).
    pub interface_param: bool,
    /// `SKIP` marker (word matched but never captured).
    pub skip: bool,
    /// `OPTIONAL` marker.
    pub optional: bool,
    /// `VALUE:` fixed fact value recorded when the word is present.
    pub value: Option<String>,
    /// `NO_PARAM` marker (named container without a captured value).
    pub no_param: bool,
    /// `IGN_VAL_FOR_DEL` marker (delete command omits the value).
    pub ignore_val_for_delete: bool,
    /// `IGN_WORD_FOR_DEL` marker (delete command omits this fixed word).
    pub ignore_word_for_delete: bool,
    /// `NEGATE_CMD:` policy.
    pub negate_cmd: Option<NegatePolicy>,
    /// `MERGE_AS_REPLACE` marker.
    pub merge_as_replace: bool,
    /// `TRANSLATE_METHOD:` name.
    pub translate_method: Option<String>,
    /// `VALUE_CHECK_METHOD:` name, possibly `!`-negated.
    pub value_check_method: Option<String>,
    /// `IF_FACTS_PRESENT:` guard field, possibly `!`-negated.
    pub if_facts_present: Option<String>,
    /// `PARENT_NAME:` re-parenting target.
    pub parent_name: Option<String>,
    /// `IF_NEXT_VAL:` guard.
    pub if_next_value: Option<NextValueGuard>,
    /// `IF_PARENT_VAL:` guard value.
    pub if_parent_value: Option<String>,
    /// `EXIT_CMD:` mode exit command.
    pub exit_cmd: Option<String>,
}

impl Annotation {
    /// Parses the text after the `=` indicator. `None` means malformed.
    fn parse(text: &str) -> Option<Annotation> {
        let mut ann = Annotation::default();
        for part in text.split(PART_SEPARATOR) {
            let (keyword, value) = match part.split_once(VALUE_SEPARATOR) {
                Some((k, v)) => (k, Some(v)),
                None => (part, None),
            };
            match keyword {
                "NAME" => ann.name = Some(value?.to_string()),
                "LIST" => ann.list = Some(value?.to_string()),
                "KEYS" => {
                    ann.keys = value?
                        .split(KEY_SEPARATOR)
                        .map(|k| k.trim_start_matches(PARAM_SIGIL).to_string())
                        .collect();
                }
                "LIST_GROUP" => ann.list_group = Some(value?.to_string()),
                "INTERFACE_LIST" => ann.interface_list = true,
                "INTERFACE_PARAM" => ann.interface_param = true,
                "SKIP" => ann.skip = true,
                "OPTIONAL" => ann.optional = true,
                "VALUE" => ann.value = Some(value?.to_string()),
                "NO_PARAM" => ann.no_param = true,
                "IGN_VAL_FOR_DEL" => ann.ignore_val_for_delete = true,
                "IGN_WORD_FOR_DEL" => ann.ignore_word_for_delete = true,
                "NEGATE_CMD" => {
                    ann.negate_cmd = Some(match value? {
                        "ALLOW" => NegatePolicy::Allow,
                        "SKIP" => NegatePolicy::Skip,
                        _ => return None,
                    });
                }
                "MERGE_AS_REPLACE" => ann.merge_as_replace = true,
                "TRANSLATE_METHOD" => ann.translate_method = Some(value?.to_string()),
                "VALUE_CHECK_METHOD" => ann.value_check_method = Some(value?.to_string()),
                "IF_FACTS_PRESENT" => ann.if_facts_present = Some(value?.to_string()),
                "PARENT_NAME" => ann.parent_name = Some(value?.to_string()),
                "IF_NEXT_VAL" => {
                    let (position, expected) = value?.split_once(NEXT_VAL_SEPARATOR)?;
                    ann.if_next_value = Some(NextValueGuard {
                        position: position.parse().ok()?,
                        expected: expected.to_string(),
                    });
                }
                "IF_PARENT_VAL" => ann.if_parent_value = Some(value?.to_string()),
                "EXIT_CMD" => ann.exit_cmd = Some(value?.to_string()),
                _ => return None,
            }
        }
        Some(ann)
    }

    /// True when no annotation part is set.
    pub fn is_empty(&self) -> bool {
        self == &Annotation::default()
    }
}

/// One word of a grammar line with its parsed annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    /// The word text before the annotation (may start with `$`).
    pub literal: String,
    /// The parsed annotation (default when the word has none).
    pub annotation: Annotation,
}

impl Word {
    /// Parses a raw grammar word.
    pub fn parse(raw: &str) -> Word {
        match raw.split_once(ANNOTATION_INDICATOR) {
            None => Word {
                literal: raw.to_string(),
                annotation: Annotation::default(),
            },
            Some((literal, rest)) => match Annotation::parse(rest) {
                Some(annotation) => Word {
                    literal: literal.to_string(),
                    annotation,
                },
                // Malformed annotations degrade to plain literals.
                None => Word {
                    literal: raw.to_string(),
                    annotation: Annotation::default(),
                },
            },
        }
    }

    /// Splits a full grammar line into words.
    pub fn parse_line(line: &str) -> Vec<Word> {
        line.split_whitespace().map(Word::parse).collect()
    }

    /// True for `$`-prefixed parameter words.
    pub fn is_param(&self) -> bool {
        self.literal.starts_with(PARAM_SIGIL)
    }

    /// Parameter name without the `$` sigil.
    pub fn param_name(&self) -> Option<&str> {
        self.literal.strip_prefix(PARAM_SIGIL)
    }

    /// The fact field this word captures into: `NAME:` when given, else the
    /// parameter name, else the literal itself.
    pub fn fact_name(&self) -> String {
        if let Some(name) = &self.annotation.name {
            return name.clone();
        }
        match self.param_name() {
            Some(param) => param.to_string(),
            None => self.literal.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_word_has_empty_annotation() {
        let word = Word::parse("mtu");
        assert_eq!(word.literal, "mtu");
        assert!(word.annotation.is_empty());
        assert!(!word.is_param());
    }

    #[test]
    fn parses_list_with_keys() {
        let word = Word::parse("vlan=LIST:vlan&KEYS:$id");
        assert_eq!(word.literal, "vlan");
        assert_eq!(word.annotation.list.as_deref(), Some("vlan"));
        assert_eq!(word.annotation.keys, vec!["id".to_string()]);
    }

    #[test]
    fn parses_multiple_keys() {
        let word = Word::parse("$src=LIST:maps&KEYS:$src|$dst");
        assert_eq!(
            word.annotation.keys,
            vec!["src".to_string(), "dst".to_string()]
        );
    }

    #[test]
    fn parses_named_optional_param() {
        let word = Word::parse("$m=NAME:mtu&OPTIONAL");
        assert!(word.is_param());
        assert_eq!(word.param_name(), Some("m"));
        assert_eq!(word.fact_name(), "mtu");
        assert!(word.annotation.optional);
    }

    #[test]
    fn parses_next_value_guard() {
        let word = Word::parse("$v=NAME:speed&IF_NEXT_VAL:2@NOT_EMPTY");
        let guard = word.annotation.if_next_value.unwrap();
        assert_eq!(guard.position, 2);
        assert_eq!(guard.expected, NextValueGuard::NOT_EMPTY);
    }

    #[test]
    fn parses_negate_policy() {
        let word = Word::parse("shutdown=NAME:shutdown&VALUE:true&NEGATE_CMD:ALLOW");
        assert_eq!(word.annotation.value.as_deref(), Some("true"));
        assert_eq!(word.annotation.negate_cmd, Some(NegatePolicy::Allow));
    }

    #[test]
    fn unknown_keyword_degrades_to_literal() {
        let word = Word::parse("weird=WHATEVER:x");
        assert_eq!(word.literal, "weird=WHATEVER:x");
        assert!(word.annotation.is_empty());
    }

    #[test]
    fn missing_required_value_degrades_to_literal() {
        let word = Word::parse("vlan=LIST");
        assert_eq!(word.literal, "vlan=LIST");
        assert!(word.annotation.is_empty());
    }

    #[test]
    fn bad_next_value_position_degrades_to_literal() {
        let word = Word::parse("$v=IF_NEXT_VAL:zero@x");
        assert_eq!(word.literal, "$v=IF_NEXT_VAL:zero@x");
        assert!(word.annotation.is_empty());
    }

    #[test]
    fn fact_name_falls_back_to_param_then_literal() {
        assert_eq!(Word::parse("$id").fact_name(), "id");
        assert_eq!(Word::parse("mtu").fact_name(), "mtu");
        assert_eq!(Word::parse("$id=NAME:name").fact_name(), "name");
    }
}
