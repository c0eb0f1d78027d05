//! Validation boundary between raw model output and [`DocumentAnalysis`].
//!
//! The walk never stops at the first problem: every field is checked and each
//! violation is appended to one ordered list, so a caller can feed the complete
//! diagnosis back to the model in a single retry.
//!
//! Normalisation on the way through:
//! - free-text fields are trimmed (dates and enumeration values are not)
//! - a missing key and an explicit `null` both become `None` for entity
//!   fields, `due_date` and `page`
//! - keys outside the schema are ignored

use serde_json::{Map, Value};

use crate::analysis::{
    Action, ActionCategory, Deadline, DocDate, DocumentAnalysis, Entities, Evidence, RiskLevel,
};
use crate::violation::{JsonType, ValidationFailure, Violation, ViolationKind};

/// Parse raw generation text and validate it as a [`DocumentAnalysis`].
///
/// The whole input must be one JSON value. Prose or markdown around the JSON
/// is a [`ValidationFailure::MalformedJson`]; strip fences before calling if
/// the model is known to add them.
pub fn parse_and_validate(raw: &str) -> Result<DocumentAnalysis, ValidationFailure> {
    let value: Value = serde_json::from_str(raw)?;
    validate_value(&value)
}

/// Validate an already-parsed JSON value.
pub fn validate_value(value: &Value) -> Result<DocumentAnalysis, ValidationFailure> {
    let mut walker = Walker::default();
    let analysis = walker.analysis(value);
    match analysis {
        Some(a) if walker.violations.is_empty() => Ok(a),
        _ => Err(ValidationFailure::SchemaViolation(walker.violations)),
    }
}

fn child(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn element(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

type Object = Map<String, Value>;

/// Accumulates violations. Every method that returns `None` has recorded at
/// least one violation first.
#[derive(Default)]
struct Walker {
    violations: Vec<Violation>,
}

impl Walker {
    fn push(&mut self, path: &str, kind: ViolationKind) {
        let path = if path.is_empty() { "$" } else { path };
        self.violations.push(Violation {
            path: path.to_string(),
            kind,
        });
    }

    fn wrong_type(&mut self, path: &str, expected: JsonType, found: &Value) {
        self.push(
            path,
            ViolationKind::WrongType {
                expected,
                found: JsonType::of(found),
            },
        );
    }

    // ── Primitives ──

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Object> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.wrong_type(path, JsonType::Object, other);
                None
            }
        }
    }

    /// Required key. `null` is returned as-is so the type check reports it.
    fn required<'v>(&mut self, obj: &'v Object, parent: &str, key: &str) -> Option<&'v Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.push(&child(parent, key), ViolationKind::Missing);
        }
        value
    }

    fn text(&mut self, obj: &Object, parent: &str, key: &str) -> Option<String> {
        let value = self.required(obj, parent, key)?;
        self.string_value(value, &child(parent, key))
    }

    fn optional_text(&mut self, obj: &Object, parent: &str, key: &str) -> Option<Option<String>> {
        match obj.get(key) {
            None | Some(Value::Null) => Some(None),
            Some(value) => self.string_value(value, &child(parent, key)).map(Some),
        }
    }

    fn string_value(&mut self, value: &Value, path: &str) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_string()),
            other => {
                self.wrong_type(path, JsonType::String, other);
                None
            }
        }
    }

    fn number_value(&mut self, value: &Value, path: &str) -> Option<f64> {
        match value.as_f64() {
            Some(n) => Some(n),
            None => {
                self.wrong_type(path, JsonType::Number, value);
                None
            }
        }
    }

    fn optional_number(&mut self, obj: &Object, parent: &str, key: &str) -> Option<Option<f64>> {
        match obj.get(key) {
            None | Some(Value::Null) => Some(None),
            Some(value) => self.number_value(value, &child(parent, key)).map(Some),
        }
    }

    fn confidence(&mut self, obj: &Object, parent: &str) -> Option<f64> {
        let path = child(parent, "confidence");
        let value = self.required(obj, parent, "confidence")?;
        let n = self.number_value(value, &path)?;
        if !(0.0..=1.0).contains(&n) {
            self.push(
                &path,
                ViolationKind::OutOfRange {
                    value: n,
                    min: 0.0,
                    max: 1.0,
                },
            );
            return None;
        }
        Some(n)
    }

    fn date_value(&mut self, value: &Value, path: &str) -> Option<DocDate> {
        let Value::String(s) = value else {
            self.wrong_type(path, JsonType::String, value);
            return None;
        };
        let date = DocDate::parse(s);
        if date.is_none() {
            self.push(path, ViolationKind::DatePattern { value: s.clone() });
        }
        date
    }

    fn enumeration<T>(
        &mut self,
        obj: &Object,
        parent: &str,
        key: &str,
        parse: fn(&str) -> Option<T>,
        allowed: &'static [&'static str],
    ) -> Option<T> {
        let path = child(parent, key);
        let value = self.required(obj, parent, key)?;
        let Value::String(s) = value else {
            self.wrong_type(&path, JsonType::String, value);
            return None;
        };
        let parsed = parse(s);
        if parsed.is_none() {
            self.push(
                &path,
                ViolationKind::NotInEnumeration {
                    value: s.clone(),
                    allowed,
                },
            );
        }
        parsed
    }

    fn array<'v>(&mut self, obj: &'v Object, parent: &str, key: &str) -> Option<&'v [Value]> {
        match self.required(obj, parent, key)? {
            Value::Array(items) => Some(items.as_slice()),
            other => {
                self.wrong_type(&child(parent, key), JsonType::Array, other);
                None
            }
        }
    }

    /// Positive page number. Integral floats (`2.0`) are accepted.
    fn page(&mut self, obj: &Object, parent: &str) -> Option<Option<u32>> {
        let path = child(parent, "page");
        let value = match obj.get("page") {
            None | Some(Value::Null) => return Some(None),
            Some(v) => v,
        };
        let n = match value.as_f64() {
            Some(n) if n.fract() == 0.0 => n,
            _ => {
                self.wrong_type(&path, JsonType::Integer, value);
                return None;
            }
        };
        let max = f64::from(u32::MAX);
        if !(1.0..=max).contains(&n) {
            self.push(
                &path,
                ViolationKind::OutOfRange {
                    value: n,
                    min: 1.0,
                    max,
                },
            );
            return None;
        }
        Some(Some(n as u32))
    }

    // ── Schema ──

    fn analysis(&mut self, value: &Value) -> Option<DocumentAnalysis> {
        let obj = self.object(value, "")?;

        let language = self.text(obj, "", "language_detected");
        let summary = self.text(obj, "", "summary_en");
        let overall_risk = self.enumeration(
            obj,
            "",
            "overall_risk",
            RiskLevel::parse,
            RiskLevel::ALLOWED,
        );
        let actions = self.list(obj, "", "actions", Self::action);
        let deadlines = self.list(obj, "", "deadlines", Self::deadline);
        let entities = self
            .required(obj, "", "entities")
            .and_then(|v| self.entities(v, "entities"));

        Some(DocumentAnalysis {
            language: language?,
            summary: summary?,
            overall_risk: overall_risk?,
            actions: actions?,
            deadlines: deadlines?,
            entities: entities?,
        })
    }

    /// Walk every element before deciding, so violations in later items are
    /// still reported when an earlier one fails.
    fn list<T>(
        &mut self,
        obj: &Object,
        parent: &str,
        key: &str,
        item: fn(&mut Self, &Value, &str) -> Option<T>,
    ) -> Option<Vec<T>> {
        let path = child(parent, key);
        let values = self.array(obj, parent, key)?;
        let items: Vec<Option<T>> = values
            .iter()
            .enumerate()
            .map(|(i, v)| item(self, v, &element(&path, i)))
            .collect();
        items.into_iter().collect()
    }

    fn action(&mut self, value: &Value, path: &str) -> Option<Action> {
        let obj = self.object(value, path)?;

        let title = self.text(obj, path, "title_en");
        let details = self.text(obj, path, "details_en");
        let due_date = match obj.get("due_date") {
            None | Some(Value::Null) => Some(None),
            Some(v) => self.date_value(v, &child(path, "due_date")).map(Some),
        };
        let confidence = self.confidence(obj, path);
        let category = self.enumeration(
            obj,
            path,
            "category",
            ActionCategory::parse,
            ActionCategory::ALLOWED,
        );
        let evidence = self.evidence_field(obj, path);

        Some(Action {
            title: title?,
            details: details?,
            due_date: due_date?,
            confidence: confidence?,
            category: category?,
            evidence: evidence?,
        })
    }

    fn deadline(&mut self, value: &Value, path: &str) -> Option<Deadline> {
        let obj = self.object(value, path)?;

        let date = self
            .required(obj, path, "date")
            .and_then(|v| self.date_value(v, &child(path, "date")));
        let meaning = self.text(obj, path, "meaning_en");
        let confidence = self.confidence(obj, path);
        let evidence = self.evidence_field(obj, path);

        Some(Deadline {
            date: date?,
            meaning: meaning?,
            confidence: confidence?,
            evidence: evidence?,
        })
    }

    fn evidence_field(&mut self, obj: &Object, parent: &str) -> Option<Evidence> {
        let path = child(parent, "evidence");
        let value = self.required(obj, parent, "evidence")?;
        let obj = self.object(value, &path)?;

        let quote = self.text(obj, &path, "quote_de");
        let page = self.page(obj, &path);

        Some(Evidence {
            quote: quote?,
            page: page?,
        })
    }

    fn entities(&mut self, value: &Value, path: &str) -> Option<Entities> {
        let obj = self.object(value, path)?;

        let sender = self.optional_text(obj, path, "sender");
        let amount_eur = self.optional_number(obj, path, "amount_eur");
        let iban = self.optional_text(obj, path, "iban");
        let reference_number = self.optional_text(obj, path, "reference_number");
        let contact_phone = self.optional_text(obj, path, "contact_phone");
        let address = self.optional_text(obj, path, "address");

        Some(Entities {
            sender: sender?,
            amount_eur: amount_eur?,
            iban: iban?,
            reference_number: reference_number?,
            contact_phone: contact_phone?,
            address: address?,
        })
    }
}
