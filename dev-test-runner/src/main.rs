//! Draws examples from the credit contract and checks them by hand.
use anyhow::{Context, Result, ensure};
use colored::Colorize;
use serde_json::Value;
use strategize::{
    Aggregate, Config, Deferred, Drawer, Example, FrozenDraw, InputContract, Predicate, Prim, Range, Record,
};

fn credit_contract(drawer: &mut Drawer, config: &Config) -> Result<InputContract> {
    let payment = Record::new().field("amount", Range::new(4, 5)).field("payment_status", Prim::Bool);
    let charge = Record::new().field("amount", Range::new(10, 20)).field("charge_status", Prim::Bool);
    let balance = Deferred::difference(
        Deferred::aggregate(Aggregate::Sum, "charges.amount", Predicate::field("charge_status")?)?,
        Deferred::aggregate(Aggregate::Sum, "payments.amount", Predicate::field("payment_status")?)?,
    );
    let state = Record::new()
        .field("payments", FrozenDraw::new(vec![payment.into()], drawer, config)?)
        .field("charges", FrozenDraw::new(vec![charge.into()], drawer, config)?)
        .field("balance", balance);
    let event = Record::new().field("amount", Range::at_most(Deferred::reference("init_state.balance")?));
    Ok(InputContract::transition(state, event))
}

fn filtered_sum(items: &Value, status: &str) -> Result<i64> {
    let mut total = 0;
    for item in items.as_array().context("expected a list")? {
        if item[status].as_bool().context("expected a status flag")? {
            total += item["amount"].as_i64().context("expected an integer amount")?;
        }
    }
    Ok(total)
}

fn verify(example: &Example) -> Result<()> {
    let state = &example.state;
    let balance = state["balance"].as_i64().context("balance is not an integer")?;
    let expected = filtered_sum(&state["charges"], "charge_status")? - filtered_sum(&state["payments"], "payment_status")?;
    ensure!(balance == expected, "balance {balance} != {expected}");
    let amount = example.event.as_ref().and_then(|e| e["amount"].as_i64()).context("event amount missing")?;
    ensure!(amount <= balance, "event amount {amount} exceeds balance {balance}");
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::default();
    let mut failures = 0;
    for seed in 0..32u64 {
        let mut drawer = Drawer::seeded(seed);
        let contract = credit_contract(&mut drawer, &config)?;
        let outcome = contract
            .example(&mut drawer, &config)
            .map_err(anyhow::Error::from)
            .and_then(|example| verify(&example).map(|()| example));
        match outcome {
            Ok(example) => {
                eprintln!("{} seed {seed}: {}", "✅".green(), serde_json::to_string(&example)?);
            }
            Err(error) => {
                failures += 1;
                eprintln!("{} seed {seed}: {error:#}", "❌".red());
            }
        }
    }
    ensure!(failures == 0, "{failures} example(s) failed");
    eprintln!("{}", "all examples satisfied the credit contract".green().bold());
    Ok(())
}
