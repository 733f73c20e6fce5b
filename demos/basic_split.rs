//! Basic split ledger usage example

use bigdecimal::BigDecimal;
use split_ledger::utils::MemoryStorage;
use split_ledger::{patterns, Money, SplitLedger, TransactionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Split Ledger - Basic Split Example\n");

    // Create a new ledger with in-memory storage
    let storage = MemoryStorage::new();
    let mut ledger = SplitLedger::new(storage);

    // 1. Register members and put them in a group
    println!("👥 Registering members...");
    let mut ids = Vec::new();
    for (username, name) in [("anna", "Anna"), ("ben", "Ben"), ("chloe", "Chloe")] {
        let member = ledger
            .register_member(username.to_string(), name.to_string())
            .await?;
        println!("  ✓ {} ({})", member.display_name, member.id);
        ids.push(member.id);
    }
    let group = ledger.create_group("Lisbon trip".to_string(), ids).await?;
    println!("  ✓ Created group '{}'\n", group.name);

    let (anna, ben, chloe) = (&group.members[0], &group.members[1], &group.members[2]);

    // 2. Record expenses
    println!("💰 Recording expenses...\n");

    let dinner = patterns::shared_expense(
        "Dinner at the harbour".to_string(),
        Money::from_minor_units(10001),
        anna.clone(),
    )?;
    ledger.record_transaction(&group.id, dinner).await?;
    println!("  ✓ Anna paid 100.01 for dinner, split equally");

    let apartment = TransactionBuilder::new(
        "Apartment".to_string(),
        Money::from_minor_units(45000),
        ben.clone(),
    )
    .percentage(anna.clone(), BigDecimal::from(40))
    .percentage(ben.clone(), BigDecimal::from(30))
    .percentage(chloe.clone(), BigDecimal::from(30))
    .build()?;
    let outcome = ledger.record_transaction(&group.id, apartment).await?;
    println!("  ✓ Ben paid 450.00 for the apartment, split 40/30/30");

    let tickets = TransactionBuilder::new(
        "Tram tickets".to_string(),
        Money::from_minor_units(1500),
        chloe.clone(),
    )
    .custom(anna.clone(), Money::from_minor_units(500))
    .custom(ben.clone(), Money::from_minor_units(1000))
    .build()?;
    ledger.record_transaction(&group.id, tickets).await?;
    println!("  ✓ Chloe paid 15.00 for tram tickets for Anna and Ben\n");

    // 3. Fix a mistake in the apartment split
    println!("✏️  Editing the apartment split to equal shares...");
    let fixed = patterns::shared_expense(
        "Apartment".to_string(),
        Money::from_minor_units(45000),
        ben.clone(),
    )?;
    let edited = ledger
        .update_transaction(
            &outcome.transaction.id,
            fixed,
            Some(outcome.transaction.version),
        )
        .await?;
    println!("  ✓ Now at version {}\n", edited.transaction.version);

    // 4. Settle part of a debt
    let settle = patterns::settle_up(chloe.clone(), ben.clone(), Money::from_minor_units(5000))?;
    ledger.record_transaction(&group.id, settle).await?;
    println!("💸 Chloe paid Ben back 50.00\n");

    // 5. Show balances
    let names = |id: &str| match group.position(id) {
        Some(0) => "Anna",
        Some(1) => "Ben",
        Some(2) => "Chloe",
        _ => "?",
    };

    let balances = ledger.group_balances(&group.id).await?;
    println!("📊 Net positions ({}):", balances.currency);
    for (member, net) in &balances.net {
        println!("  {:<6} {:>8}", names(member), net.to_string());
    }

    println!("\n🔗 Who owes whom:");
    for debt in &balances.debts {
        println!(
            "  {} owes {} {}",
            names(&debt.debtor),
            names(&debt.creditor),
            debt.amount
        );
    }

    // 6. Check integrity
    let report = ledger.verify_balances(&group.id).await?;
    println!(
        "\n✅ Balances verified: {}",
        if report.is_valid { "consistent" } else { "inconsistent" }
    );
    for issue in &report.issues {
        println!("  ⚠️  {}", issue);
    }

    Ok(())
}
