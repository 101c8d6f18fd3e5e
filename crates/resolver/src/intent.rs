//! Typed view of the classifier payload.
//!
//! The upstream classifier sends `{"intent": "...", "slots": {...}}` where every
//! slot is a string, a number or null. Nothing else about the payload is trusted:
//! it is validated here once and the rest of the system works on
//! [`ClassifiedIntent`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::normalize::normalize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("malformed classifier payload: {0}")]
    Malformed(String),

    #[error("unknown intent: {0}")]
    UnknownIntent(String),

    #[error("missing slot: {0}")]
    MissingSlot(&'static str),

    #[error("invalid slot {slot}: {reason}")]
    InvalidSlot { slot: &'static str, reason: String },
}

impl IntentError {
    fn invalid(slot: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSlot {
            slot,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Birth,
    Purchase,
    Sale,
    Death,
    Transfer,
    Recategorization,
    StockQuery,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::Birth => "birth",
            IntentKind::Purchase => "purchase",
            IntentKind::Sale => "sale",
            IntentKind::Death => "death",
            IntentKind::Transfer => "transfer",
            IntentKind::Recategorization => "recategorization",
            IntentKind::StockQuery => "stock_query",
        }
    }

    /// Whether the movement adds animals to the lot.
    pub fn is_inbound(self) -> bool {
        matches!(self, IntentKind::Birth | IntentKind::Purchase)
    }
}

impl std::str::FromStr for IntentKind {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "birth" => Ok(IntentKind::Birth),
            "purchase" => Ok(IntentKind::Purchase),
            "sale" => Ok(IntentKind::Sale),
            "death" => Ok(IntentKind::Death),
            "transfer" => Ok(IntentKind::Transfer),
            "recategorization" => Ok(IntentKind::Recategorization),
            "stock_query" => Ok(IntentKind::StockQuery),
            other => Err(IntentError::UnknownIntent(other.to_string())),
        }
    }
}

/// A lot mention plus the optional module it was qualified with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSlot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ClassifiedIntent {
    Birth {
        lot: LotSlot,
        category: String,
        quantity: i64,
    },
    Purchase {
        lot: LotSlot,
        category: String,
        quantity: i64,
    },
    Sale {
        lot: LotSlot,
        category: String,
        quantity: i64,
    },
    Death {
        lot: LotSlot,
        category: String,
        quantity: i64,
    },
    Transfer {
        from_lot: LotSlot,
        to_lot: LotSlot,
        category: String,
        quantity: i64,
    },
    Recategorization {
        lot: LotSlot,
        category: String,
        to_category: String,
        quantity: i64,
    },
    StockQuery {
        lot: LotSlot,
        #[serde(skip_serializing_if = "Option::is_none")]
        category: Option<String>,
    },
}

impl ClassifiedIntent {
    pub fn from_json(json: &str) -> Result<Self, IntentError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| IntentError::Malformed(e.to_string()))?;
        Self::try_from(value)
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            ClassifiedIntent::Birth { .. } => IntentKind::Birth,
            ClassifiedIntent::Purchase { .. } => IntentKind::Purchase,
            ClassifiedIntent::Sale { .. } => IntentKind::Sale,
            ClassifiedIntent::Death { .. } => IntentKind::Death,
            ClassifiedIntent::Transfer { .. } => IntentKind::Transfer,
            ClassifiedIntent::Recategorization { .. } => IntentKind::Recategorization,
            ClassifiedIntent::StockQuery { .. } => IntentKind::StockQuery,
        }
    }
}

impl TryFrom<Value> for ClassifiedIntent {
    type Error = IntentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut payload) = value else {
            return Err(IntentError::Malformed("payload must be an object".into()));
        };

        let kind: IntentKind = match payload.get("intent") {
            Some(Value::String(intent)) => intent.parse()?,
            Some(_) => return Err(IntentError::Malformed("intent must be a string".into())),
            None => return Err(IntentError::Malformed("missing intent".into())),
        };
        let slots = match payload.remove("slots") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(slots)) => slots,
            Some(_) => return Err(IntentError::Malformed("slots must be an object".into())),
        };
        let slots = Slots(&slots);

        let intent = match kind {
            IntentKind::Birth => ClassifiedIntent::Birth {
                lot: slots.lot("lot", "module")?,
                category: slots.required("category")?,
                quantity: slots.quantity()?,
            },
            IntentKind::Purchase => ClassifiedIntent::Purchase {
                lot: slots.lot("lot", "module")?,
                category: slots.required("category")?,
                quantity: slots.quantity()?,
            },
            IntentKind::Sale => ClassifiedIntent::Sale {
                lot: slots.lot("lot", "module")?,
                category: slots.required("category")?,
                quantity: slots.quantity()?,
            },
            IntentKind::Death => ClassifiedIntent::Death {
                lot: slots.lot("lot", "module")?,
                category: slots.required("category")?,
                quantity: slots.quantity()?,
            },
            IntentKind::Transfer => ClassifiedIntent::Transfer {
                from_lot: slots.lot("from_lot", "from_module")?,
                to_lot: slots.lot("to_lot", "to_module")?,
                category: slots.required("category")?,
                quantity: slots.quantity()?,
            },
            IntentKind::Recategorization => ClassifiedIntent::Recategorization {
                lot: slots.lot("lot", "module")?,
                category: slots.required("category")?,
                to_category: slots.required("to_category")?,
                quantity: slots.quantity()?,
            },
            IntentKind::StockQuery => ClassifiedIntent::StockQuery {
                lot: slots.lot("lot", "module")?,
                category: slots.text("category")?,
            },
        };
        Ok(intent)
    }
}

struct Slots<'a>(&'a Map<String, Value>);

impl Slots<'_> {
    /// A name slot: strings are trimmed, numbers stringified, blanks count as absent.
    fn text(&self, slot: &'static str) -> Result<Option<String>, IntentError> {
        match self.0.get(slot) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => {
                let s = s.trim();
                Ok((!s.is_empty()).then(|| s.to_string()))
            }
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(IntentError::invalid(
                slot,
                "expected a string, a number or null",
            )),
        }
    }

    fn required(&self, slot: &'static str) -> Result<String, IntentError> {
        self.text(slot)?.ok_or(IntentError::MissingSlot(slot))
    }

    /// A lot slot; the module falls back to the generic `module` slot.
    fn lot(&self, slot: &'static str, module_slot: &'static str) -> Result<LotSlot, IntentError> {
        let name = self.required(slot)?;
        let module = match self.text(module_slot)? {
            Some(module) => Some(module),
            None if module_slot != "module" => self.text("module")?,
            None => None,
        };
        Ok(LotSlot { name, module })
    }

    fn quantity(&self) -> Result<i64, IntentError> {
        let quantity = match self.0.get("quantity") {
            None | Some(Value::Null) => return Err(IntentError::MissingSlot("quantity")),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_number)),
            Some(Value::String(s)) => normalize(s).parse::<i64>().ok(),
            Some(_) => None,
        };
        match quantity {
            Some(q) if q > 0 => Ok(q),
            _ => Err(IntentError::invalid("quantity", "expected a positive integer")),
        }
    }
}

/// Integral floats that fit an `i64` ("3.0"); anything else is rejected, not truncated.
fn whole_number(f: f64) -> Option<i64> {
    let in_range = (i64::MIN as f64..i64::MAX as f64).contains(&f);
    (in_range && f.fract() == 0.0).then_some(f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<ClassifiedIntent, IntentError> {
        ClassifiedIntent::try_from(value)
    }

    #[test]
    fn parses_sale_with_numeric_and_spelled_quantities() {
        let sale = parse(json!({
            "intent": "sale",
            "slots": {"lot": "Potrero Norte", "category": "vacas", "quantity": 4}
        }))
        .unwrap();
        assert_eq!(
            sale,
            ClassifiedIntent::Sale {
                lot: LotSlot {
                    name: "Potrero Norte".into(),
                    module: None
                },
                category: "vacas".into(),
                quantity: 4,
            }
        );

        let spelled = parse(json!({
            "intent": "sale",
            "slots": {"lot": "norte", "category": "vacas", "quantity": "diez"}
        }))
        .unwrap();
        assert!(matches!(spelled, ClassifiedIntent::Sale { quantity: 10, .. }));
    }

    #[test]
    fn numeric_lot_names_are_stringified() {
        let query = parse(json!({"intent": "stock_query", "slots": {"lot": 3}})).unwrap();
        assert_eq!(
            query,
            ClassifiedIntent::StockQuery {
                lot: LotSlot {
                    name: "3".into(),
                    module: None
                },
                category: None,
            }
        );
    }

    #[test]
    fn transfer_modules_fall_back_to_shared_module_slot() {
        let transfer = parse(json!({
            "intent": "transfer",
            "slots": {
                "from_lot": "norte", "to_lot": "sur", "to_module": "Modulo 2",
                "module": "Modulo 1", "category": "novillos", "quantity": "12"
            }
        }))
        .unwrap();

        let ClassifiedIntent::Transfer { from_lot, to_lot, .. } = transfer else {
            panic!("expected transfer");
        };
        assert_eq!(from_lot.module.as_deref(), Some("Modulo 1"));
        assert_eq!(to_lot.module.as_deref(), Some("Modulo 2"));
    }

    #[test]
    fn rejects_unknown_intents_and_bad_shapes() {
        assert_eq!(
            parse(json!({"intent": "milking", "slots": {}})),
            Err(IntentError::UnknownIntent("milking".into()))
        );
        assert!(matches!(
            parse(json!({"intent": "sale", "slots": ["lot"]})),
            Err(IntentError::Malformed(_))
        ));
        assert!(matches!(parse(json!("sale")), Err(IntentError::Malformed(_))));
        assert!(matches!(
            parse(json!({"intent": "sale", "slots": {"lot": {"name": "norte"}, "category": "vacas", "quantity": 1}})),
            Err(IntentError::InvalidSlot { slot: "lot", .. })
        ));
    }

    #[test]
    fn requires_slots_and_positive_quantities() {
        assert_eq!(
            parse(json!({"intent": "death", "slots": {"lot": "norte", "quantity": 1}})),
            Err(IntentError::MissingSlot("category"))
        );
        assert_eq!(
            parse(json!({"intent": "birth", "slots": {"lot": " ", "category": "terneros", "quantity": 1}})),
            Err(IntentError::MissingSlot("lot"))
        );
        for quantity in [
            json!(0),
            json!(-3),
            json!(2.5),
            json!(1e30),
            json!("muchas"),
            json!(true),
        ] {
            let result = parse(json!({
                "intent": "purchase",
                "slots": {"lot": "norte", "category": "vacas", "quantity": quantity}
            }));
            assert!(
                matches!(result, Err(IntentError::InvalidSlot { slot: "quantity", .. })),
                "quantity {quantity}"
            );
        }
    }

    #[test]
    fn integral_float_quantities_are_accepted() {
        let intent = parse(json!({
            "intent": "purchase",
            "slots": {"lot": "norte", "category": "vacas", "quantity": 4.0}
        }))
        .unwrap();
        assert!(matches!(intent, ClassifiedIntent::Purchase { quantity: 4, .. }));
    }

    #[test]
    fn serializes_with_an_intent_tag() {
        let query = ClassifiedIntent::StockQuery {
            lot: LotSlot {
                name: "norte".into(),
                module: None,
            },
            category: Some("vacas".into()),
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"intent": "stock_query", "lot": {"name": "norte"}, "category": "vacas"})
        );
        assert_eq!(query.kind().as_str(), "stock_query");
    }
}
