//! State-transition input contracts.
//!
//! A contract pairs a state schema with an optional event schema. The event
//! is resolved in a record that holds the drawn state as `init_state`, so
//! event fields may be bounded by the state they apply to.
use proptest::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::draw::Drawer;
use crate::error::{Error, Result};
use crate::node::{Node, Record};
use crate::path::Path;
use crate::strategize::settle;
use crate::validate::validate;

pub const INIT_STATE: &str = "init_state";
pub const EVENT: &str = "event";

#[derive(Clone, Debug, PartialEq)]
pub struct InputContract {
    pub state: Node,
    pub event: Option<Node>,
}

/// One drawn input: a state and, for transitions, the event applied to it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Example {
    pub state: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
}

impl InputContract {
    /// A contract with no event: it describes how a state comes to exist.
    pub fn creator(state: impl Into<Node>) -> Self {
        InputContract { state: state.into(), event: None }
    }

    pub fn transition(state: impl Into<Node>, event: impl Into<Node>) -> Self {
        InputContract { state: state.into(), event: Some(event.into()) }
    }

    pub fn is_creator(&self) -> bool { self.event.is_none() }

    fn pair(state: Node, event: Node) -> Node {
        Record::new().field(INIT_STATE, state).field(EVENT, event).into()
    }

    pub fn strategy(&self, config: &Config) -> BoxedStrategy<Result<Example>> {
        let event = self.event.clone();
        let pair_config = config.clone();
        settle(self.state.clone(), config.clone())
            .prop_flat_map(move |state| {
                let state = match state {
                    Ok(state) => state,
                    Err(err) => return Just(Err(err)).boxed(),
                };
                match &event {
                    None => Just(state.to_value().map(|state| Example { state, event: None })).boxed(),
                    Some(event) => settle(Self::pair(state, event.clone()), pair_config.clone())
                        .prop_map(|pair| split(pair?))
                        .boxed(),
                }
            })
            .boxed()
    }

    pub fn example(&self, drawer: &mut Drawer, config: &Config) -> Result<Example> {
        drawer.draw(&self.strategy(config))?
    }

    /// Validate a concrete state (and event) against this contract.
    pub fn check(&self, state: &Value, event: Option<&Value>) -> Result<()> {
        validate(&self.state, state)?;
        let at = Path::root().child(EVENT);
        match (&self.event, event) {
            (None, None) => Ok(()),
            (Some(schema), Some(event)) => {
                // the state was checked above; here it is only the context the event reads
                let pair = Self::pair(Node::from(state.clone()), schema.clone());
                let mut doc = serde_json::Map::new();
                doc.insert(INIT_STATE.to_string(), state.clone());
                doc.insert(EVENT.to_string(), event.clone());
                validate(&pair, &Value::Object(doc))
            }
            (Some(_), None) => Err(Error::invalid(&at, &Value::Null, "transition contract needs an event")),
            (None, Some(event)) => Err(Error::invalid(&at, event, "creator contract takes no event")),
        }
    }
}

fn split(pair: Node) -> Result<Example> {
    let Value::Object(mut pair) = pair.to_value()? else {
        return Err(Error::Type("settled contract pair is not an object".to_string()));
    };
    let state = pair.remove(INIT_STATE).unwrap_or(Value::Null);
    let event = pair.remove(EVENT);
    Ok(Example { state, event })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;
    use crate::node::Prim;
    use crate::validators::Range;
    use serde_json::json;

    fn account() -> InputContract {
        InputContract::transition(
            Record::new().field("limit", Range::new(10, 100)).field("frozen", Prim::Bool),
            Record::new().field("spend", Range::new(0, Deferred::reference("init_state.limit").unwrap())),
        )
    }

    #[test]
    fn events_are_bounded_by_the_drawn_state() {
        let contract = account();
        let mut drawer = Drawer::seeded(17);
        for _ in 0..32 {
            let example = contract.example(&mut drawer, &Config::default()).unwrap();
            let limit = example.state["limit"].as_i64().unwrap();
            let spend = example.event.as_ref().unwrap()["spend"].as_i64().unwrap();
            assert!((10..=100).contains(&limit));
            assert!((0..=limit).contains(&spend));
            contract.check(&example.state, example.event.as_ref()).unwrap();
        }
    }

    #[test]
    fn creators_draw_no_event() {
        let contract = InputContract::creator(Record::new().field("id", Prim::Int));
        assert!(contract.is_creator());
        let example = contract.example(&mut Drawer::seeded(1), &Config::default()).unwrap();
        assert!(example.event.is_none());
        assert!(serde_json::to_value(&example).unwrap().get("event").is_none());
    }

    #[test]
    fn check_rejects_mismatched_inputs() {
        let contract = account();
        let state = json!({"limit": 20, "frozen": false});
        assert!(contract.check(&state, Some(&json!({"spend": 21}))).is_err());
        assert!(contract.check(&state, None).is_err());
        assert!(InputContract::creator(Prim::Int).check(&json!(1), Some(&json!(1))).is_err());
        contract.check(&state, Some(&json!({"spend": 20}))).unwrap();
    }
}
