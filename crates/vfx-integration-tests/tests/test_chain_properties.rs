//! Chain properties across vfx-core and vfx-chain: contiguous sequences,
//! linkage, idempotent creation, concurrent creation, and deterministic
//! canonicalization.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use vfx_chain::{ChainRegistry, ChainStore, ConfigUpdate, InMemoryInvoiceSource, QrSettings};
use vfx_core::{
    canonicalize_invoice, chain_digest, Amount, BusinessId, ChainHash, InvoiceDirection, InvoiceId, InvoiceLine,
    InvoiceSnapshot, InvoiceTotals, PartyProfile, Quantity, TaxRate,
};

fn snapshot(invoice: &str, lines: Vec<InvoiceLine>) -> InvoiceSnapshot {
    let mut snap = InvoiceSnapshot {
        invoice_id: InvoiceId::new(invoice).unwrap(),
        invoice_number: format!("F-{invoice}"),
        direction: InvoiceDirection::Issued,
        issue_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        currency: "EUR".to_string(),
        issuer: PartyProfile {
            legal_id: "B12345678".to_string(),
            name: "Acme Tools SL".to_string(),
            address: None,
        },
        counterparty: PartyProfile {
            legal_id: "A87654321".to_string(),
            name: "Widgets SA".to_string(),
            address: None,
        },
        lines,
        totals: InvoiceTotals {
            subtotal: Amount::ZERO,
            tax: Amount::ZERO,
            total: Amount::ZERO,
        },
    };
    snap.totals = snap.derived_totals().unwrap();
    snap
}

fn hammer() -> InvoiceLine {
    InvoiceLine {
        description: "Hammer".to_string(),
        quantity: Quantity::units(2),
        unit_price: Amount::from_minor(1250),
        tax_rate: TaxRate::from_basis_points(2100),
    }
}

fn line_strategy() -> impl Strategy<Value = InvoiceLine> {
    (
        "[A-Za-z]{1,12}",
        1i64..500,
        1i64..1_000_000,
        prop::sample::select(vec![0i64, 400, 1000, 2100]),
    )
        .prop_map(|(description, units, price, rate)| InvoiceLine {
            description,
            quantity: Quantity::units(units),
            unit_price: Amount::from_minor(price),
            tax_rate: TaxRate::from_basis_points(rate),
        })
}

fn enabled_registry() -> (Arc<ChainRegistry>, InMemoryInvoiceSource, BusinessId) {
    let source = InMemoryInvoiceSource::new();
    let registry = Arc::new(ChainRegistry::new(
        ChainStore::new(),
        Arc::new(source.clone()),
        QrSettings::default(),
    ));
    let acme = BusinessId::new("acme").unwrap();
    registry
        .configure(
            &acme,
            ConfigUpdate {
                enabled: Some(true),
                ..ConfigUpdate::default()
            },
        )
        .unwrap();
    (registry, source, acme)
}

#[test]
fn sequences_are_contiguous_and_linked() {
    let (registry, source, acme) = enabled_registry();
    for n in 1..=25 {
        let snap = snapshot(&format!("inv-{n}"), vec![hammer()]);
        let id = snap.invoice_id.clone();
        source.upsert(acme.clone(), snap);
        registry.get_or_create(&acme, &id, InvoiceDirection::Issued).unwrap();
    }

    let records = registry.records(&acme);
    let mut previous = ChainHash::genesis();
    for (expected, record) in (1u64..).zip(&records) {
        assert_eq!(record.sequence_number, expected);
        assert_eq!(record.previous_hash, previous);
        let snap = source_snapshot(&registry, &acme, &record.invoice_id);
        let bytes = canonicalize_invoice(&snap).unwrap();
        assert_eq!(record.current_hash, chain_digest(&previous, &bytes));
        previous = record.current_hash.clone();
    }
    assert_eq!(registry.config(&acme).unwrap().last_sequence_number, 25);
    assert!(registry.verify_chain(&acme).unwrap().is_intact());
}

fn source_snapshot(registry: &ChainRegistry, business: &BusinessId, invoice: &InvoiceId) -> InvoiceSnapshot {
    registry.snapshot(business, invoice).unwrap()
}

#[test]
fn concurrent_creation_yields_exactly_the_next_range() {
    let (registry, source, acme) = enabled_registry();
    // Three records exist before the race.
    for n in 1..=3 {
        let snap = snapshot(&format!("pre-{n}"), vec![hammer()]);
        let id = snap.invoice_id.clone();
        source.upsert(acme.clone(), snap);
        registry.get_or_create(&acme, &id, InvoiceDirection::Issued).unwrap();
    }

    const N: u64 = 32;
    for n in 1..=N {
        source.upsert(acme.clone(), snapshot(&format!("race-{n}"), vec![hammer()]));
    }
    let sequences: BTreeSet<u64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (1..=N)
            .map(|n| {
                let registry = Arc::clone(&registry);
                let acme = acme.clone();
                scope.spawn(move || {
                    let id = InvoiceId::new(format!("race-{n}")).unwrap();
                    registry
                        .get_or_create(&acme, &id, InvoiceDirection::Issued)
                        .unwrap()
                        .sequence_number
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequences, (4..=3 + N).collect::<BTreeSet<_>>());
    assert!(registry.verify_chain(&acme).unwrap().is_intact());
}

#[test]
fn concurrent_requests_for_one_invoice_create_one_record() {
    let (registry, source, acme) = enabled_registry();
    source.upsert(acme.clone(), snapshot("inv-1", vec![hammer()]));
    let ids: BTreeSet<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let acme = acme.clone();
                scope.spawn(move || {
                    let id = InvoiceId::new("inv-1").unwrap();
                    registry.get_or_create(&acme, &id, InvoiceDirection::Issued).unwrap().id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(ids.len(), 1);
    assert_eq!(registry.records(&acme).len(), 1);
}

#[test]
fn businesses_have_independent_chains() {
    let (registry, source, acme) = enabled_registry();
    let beta = BusinessId::new("beta").unwrap();
    registry
        .configure(
            &beta,
            ConfigUpdate {
                enabled: Some(true),
                ..ConfigUpdate::default()
            },
        )
        .unwrap();
    for business in [&acme, &beta, &acme] {
        let n = registry.records(business).len() + 1;
        let snap = snapshot(&format!("{business}-{n}"), vec![hammer()]);
        let id = snap.invoice_id.clone();
        source.upsert(business.clone(), snap);
        registry.get_or_create(business, &id, InvoiceDirection::Issued).unwrap();
    }
    assert_eq!(registry.records(&acme).len(), 2);
    let beta_first = &registry.records(&beta)[0];
    assert_eq!(beta_first.sequence_number, 1);
    assert!(beta_first.previous_hash.is_genesis());
}

proptest! {
    #[test]
    fn canonicalization_is_deterministic(lines in prop::collection::vec(line_strategy(), 1..6)) {
        let snap = snapshot("inv-p", lines);
        let a = canonicalize_invoice(&snap).unwrap();
        let b = canonicalize_invoice(&snap.clone()).unwrap();
        prop_assert_eq!(a.as_bytes(), b.as_bytes());
        prop_assert_eq!(chain_digest(&ChainHash::genesis(), &a), chain_digest(&ChainHash::genesis(), &b));
    }

    #[test]
    fn surrounding_whitespace_does_not_change_the_hash(lines in prop::collection::vec(line_strategy(), 1..4)) {
        let snap = snapshot("inv-w", lines);
        let mut padded = snap.clone();
        padded.invoice_number = format!("  {}  ", snap.invoice_number);
        padded.issuer.name = format!("{} ", snap.issuer.name);
        let plain_canon = canonicalize_invoice(&snap).unwrap();
        let padded_canon = canonicalize_invoice(&padded).unwrap();
        prop_assert_eq!(plain_canon.as_bytes(), padded_canon.as_bytes());
    }

    #[test]
    fn any_chain_length_verifies(count in 1usize..20) {
        let (registry, source, acme) = enabled_registry();
        for n in 1..=count {
            let snap = snapshot(&format!("inv-{n}"), vec![hammer()]);
            let id = snap.invoice_id.clone();
            source.upsert(acme.clone(), snap);
            registry.get_or_create(&acme, &id, InvoiceDirection::Issued).unwrap();
        }
        let sequences: Vec<u64> = registry.records(&acme).iter().map(|r| r.sequence_number).collect();
        prop_assert_eq!(sequences, (1..=count as u64).collect::<Vec<_>>());
        let report = registry.verify_chain(&acme).unwrap();
        prop_assert!(report.is_intact());
        prop_assert_eq!(report.records_checked, count as u64);
    }
}
