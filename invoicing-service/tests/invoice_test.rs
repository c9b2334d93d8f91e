//! Invoice creation integration tests for invoicing-service.

mod common;

use common::{buyer, date, dec, draft, item, spawn_app, standard_items, VALID_NIP};
use invoicing_service::error::{ErrorKind, InvoicingError};
use invoicing_service::models::{
    BuyerSnapshot, CreateContractor, InvoiceStatus, ListInvoicesQuery, NewInvoiceItem, UpdateProfile, VatRate,
};

#[tokio::test]
async fn create_computes_item_amounts_and_totals() {
    let app = spawn_app().await;

    let view = app
        .invoices
        .create(app.user_id, draft("FV/1", standard_items()))
        .await
        .expect("Failed to create invoice");

    assert_eq!(view.invoice.total_net.to_string(), "120.00");
    assert_eq!(view.invoice.total_vat.to_string(), "12.60");
    assert_eq!(view.invoice.total_gross.to_string(), "132.60");

    assert_eq!(view.items.len(), 2);
    let first = &view.items[0];
    assert_eq!(first.position, 1);
    assert_eq!(first.unit, "szt.");
    assert_eq!(first.net_amount.to_string(), "20.00");
    assert_eq!(first.vat_amount.to_string(), "4.60");
    assert_eq!(first.gross_amount.to_string(), "24.60");
    assert_eq!(view.items[1].gross_amount.to_string(), "108.00");
}

#[tokio::test]
async fn create_rounds_half_away_from_zero() {
    let app = spawn_app().await;

    let view = app
        .invoices
        .create(
            app.user_id,
            draft("FV/R", vec![item(1, "Cable", "1.5", "3.33", VatRate::Rate23)]),
        )
        .await
        .expect("Failed to create invoice");

    assert_eq!(view.items[0].net_amount.to_string(), "5.00");
    assert_eq!(view.items[0].vat_amount.to_string(), "1.15");
    assert_eq!(view.invoice.total_gross.to_string(), "6.15");
}

#[tokio::test]
async fn exempt_and_zero_rated_items_carry_no_vat() {
    let app = spawn_app().await;

    let view = app
        .invoices
        .create(
            app.user_id,
            draft(
                "FV/ZW",
                vec![
                    item(1, "Training", "1", "500.00", VatRate::Exempt),
                    item(2, "Export", "2", "50.00", VatRate::Rate0),
                ],
            ),
        )
        .await
        .expect("Failed to create invoice");

    assert_eq!(view.invoice.total_net.to_string(), "600.00");
    assert_eq!(view.invoice.total_vat.to_string(), "0.00");
    assert_eq!(view.invoice.total_gross.to_string(), "600.00");
}

#[tokio::test]
async fn create_increments_counter_exactly_once() {
    let app = spawn_app().await;
    assert_eq!(app.next_number().await, "FV/2025/03/001");

    app.invoices
        .create(app.user_id, draft("MANUAL-1", standard_items()))
        .await
        .expect("Failed to create invoice");

    assert_eq!(app.next_number().await, "FV/2025/03/002");
}

#[tokio::test]
async fn blank_number_takes_next_from_sequence() {
    let app = spawn_app().await;

    let first = app
        .invoices
        .create(app.user_id, draft("", standard_items()))
        .await
        .expect("Failed to create invoice");
    let second = app
        .invoices
        .create(app.user_id, draft("  ", standard_items()))
        .await
        .expect("Failed to create invoice");

    assert_eq!(first.invoice.invoice_number, "FV/2025/03/001");
    assert_eq!(second.invoice.invoice_number, "FV/2025/03/002");
}

#[tokio::test]
async fn duplicate_number_conflicts_per_user_only() {
    let app = spawn_app().await;
    let other_user = app.another_user().await;

    app.invoices
        .create(app.user_id, draft("FV/2025/001", standard_items()))
        .await
        .expect("Failed to create invoice");

    let err = app
        .invoices
        .create(app.user_id, draft("FV/2025/001", standard_items()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, InvoicingError::NumberExists(ref n) if n == "FV/2025/001"));

    app.invoices
        .create(other_user, draft("FV/2025/001", standard_items()))
        .await
        .expect("Same number for another user should succeed");
}

#[tokio::test]
async fn due_date_before_issue_date_fails_without_writes() {
    let app = spawn_app().await;
    let writes = app.store.writes();

    let mut cmd = draft("FV/D", standard_items());
    cmd.due_date = date(2025, 3, 14);

    let err = app.invoices.create(app.user_id, cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(err, InvoicingError::InvalidDates { .. }));
    assert_eq!(app.store.writes(), writes);
}

#[tokio::test]
async fn non_draft_requires_complete_profile() {
    let app = spawn_app().await;

    let mut cmd = draft("FV/U", standard_items());
    cmd.status = InvoiceStatus::Unpaid;

    let err = app.invoices.create(app.user_id, cmd.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    match err {
        InvoicingError::IncompleteProfile { missing } => {
            assert_eq!(missing, vec!["companyName", "address", "nip"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(app.next_number().await, "FV/2025/03/001");

    app.complete_profile().await;
    let view = app
        .invoices
        .create(app.user_id, cmd)
        .await
        .expect("Failed to create unpaid invoice");
    assert_eq!(view.invoice.status, InvoiceStatus::Unpaid);
    assert_eq!(view.invoice.seller.company_name, "ACME Sp. z o.o.");
    assert_eq!(view.invoice.seller.nip, VALID_NIP);
}

#[tokio::test]
async fn non_draft_requires_items() {
    let app = spawn_app().await;
    app.complete_profile().await;

    let mut cmd = draft("FV/E", Vec::new());
    cmd.status = InvoiceStatus::Paid;

    let err = app.invoices.create(app.user_id, cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let empty_draft = app
        .invoices
        .create(app.user_id, draft("FV/E", Vec::new()))
        .await
        .expect("Drafts may start empty");
    assert!(empty_draft.items.is_empty());
    assert_eq!(empty_draft.invoice.total_gross.to_string(), "0.00");
}

#[tokio::test]
async fn seller_snapshot_ignores_later_profile_edits() {
    let app = spawn_app().await;
    app.complete_profile().await;

    let view = app
        .invoices
        .create(app.user_id, draft("FV/S", standard_items()))
        .await
        .expect("Failed to create invoice");

    app.profiles
        .update(
            app.user_id,
            UpdateProfile {
                company_name: Some("Renamed Sp. z o.o.".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update profile");

    let stored = app
        .invoices
        .find_one(app.user_id, view.invoice.id)
        .await
        .expect("Failed to load invoice");
    assert_eq!(stored.invoice.seller.company_name, "ACME Sp. z o.o.");
}

#[tokio::test]
async fn buyer_is_copied_from_contractor() {
    let app = spawn_app().await;
    let contractor = app
        .contractors
        .create(
            app.user_id,
            CreateContractor {
                name: "Hurtownia Sp. j.".to_string(),
                address: Some("ul. Krótka 2, Gdańsk".to_string()),
                nip: Some("123-456-32-18".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create contractor");

    let mut cmd = draft("FV/C", standard_items());
    cmd.buyer = None;
    cmd.contractor_id = Some(contractor.id);

    let view = app
        .invoices
        .create(app.user_id, cmd)
        .await
        .expect("Failed to create invoice");
    assert_eq!(view.invoice.buyer.name, "Hurtownia Sp. j.");
    assert_eq!(view.invoice.buyer.nip.as_deref(), Some("1234563218"));
    assert_eq!(view.invoice.contractor_id, Some(contractor.id));
}

#[tokio::test]
async fn unknown_contractor_or_missing_buyer_is_rejected() {
    let app = spawn_app().await;

    let mut cmd = draft("FV/X", standard_items());
    cmd.buyer = None;
    cmd.contractor_id = Some(uuid::Uuid::new_v4());
    let err = app.invoices.create(app.user_id, cmd.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    cmd.contractor_id = None;
    let err = app.invoices.create(app.user_id, cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn failed_item_insert_removes_the_invoice() {
    let app = spawn_app().await;
    app.store.fail_next_item_insert();

    let err = app
        .invoices
        .create(app.user_id, draft("FV/F", standard_items()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.to_string(), "Internal error");

    let page = app
        .invoices
        .find_all(app.user_id, ListInvoicesQuery::default())
        .await
        .expect("Failed to list invoices");
    assert_eq!(page.total, 0);
    assert_eq!(app.next_number().await, "FV/2025/03/001");

    app.invoices
        .create(app.user_id, draft("FV/F", standard_items()))
        .await
        .expect("Number should be free after compensation");
}

#[tokio::test]
async fn failed_counter_increment_removes_the_invoice() {
    let app = spawn_app().await;
    app.store.fail_next_counter_increment();

    let err = app
        .invoices
        .create(app.user_id, draft("", standard_items()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    let page = app
        .invoices
        .find_all(app.user_id, ListInvoicesQuery::default())
        .await
        .expect("Failed to list invoices");
    assert_eq!(page.total, 0);
    assert_eq!(app.next_number().await, "FV/2025/03/001");

    // Auto-numbering keeps working once the store recovers.
    for expected in ["FV/2025/03/001", "FV/2025/03/002"] {
        let view = app
            .invoices
            .create(app.user_id, draft("", standard_items()))
            .await
            .expect("Failed to create invoice");
        assert_eq!(view.invoice.invoice_number, expected);
    }
}

#[tokio::test]
async fn failed_counter_increment_on_duplicate_keeps_numbering_usable() {
    let app = spawn_app().await;
    let source = app
        .invoices
        .create(app.user_id, draft("", standard_items()))
        .await
        .expect("Failed to create invoice");
    app.store.fail_next_counter_increment();

    let err = app
        .invoices
        .duplicate(app.user_id, source.invoice.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    let copy = app
        .invoices
        .duplicate(app.user_id, source.invoice.id, None)
        .await
        .expect("Failed to duplicate invoice");
    assert_eq!(copy.invoice.invoice_number, "FV/2025/03/002");
}

#[tokio::test]
async fn oversized_amounts_are_validation_errors() {
    let app = spawn_app().await;

    let huge = vec![item(
        1,
        "Big",
        "1000000000000000",
        "1000000000000000",
        VatRate::Rate23,
    )];
    let err = app
        .invoices
        .create(app.user_id, draft("FV/BIG", huge))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Each input fits, but the line gross does not.
    let line = vec![item(1, "Big", "1000000", "1000000", VatRate::Rate23)];
    let err = app
        .invoices
        .create(app.user_id, draft("FV/BIG", line))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Each line fits, but the invoice total does not.
    let lines = vec![
        item(1, "Half", "1", "600000000000.00", VatRate::Exempt),
        item(2, "Half", "1", "600000000000.00", VatRate::Exempt),
    ];
    let err = app
        .invoices
        .create(app.user_id, draft("FV/BIG", lines))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(app.store.writes(), 1);

    let largest = vec![item(1, "Max", "1", "999999999999.99", VatRate::Exempt)];
    let view = app
        .invoices
        .create(app.user_id, draft("FV/MAX", largest))
        .await
        .expect("The largest amount must be accepted");
    assert_eq!(view.invoice.total_gross, dec("999999999999.99"));
}

#[tokio::test]
async fn oversized_text_fields_are_validation_errors() {
    let app = spawn_app().await;

    let long_number = "9".repeat(101);
    let err = app
        .invoices
        .create(app.user_id, draft(&long_number, standard_items()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut cmd = draft("FV/T1", standard_items());
    cmd.buyer = Some(BuyerSnapshot {
        name: "B".repeat(256),
        ..buyer()
    });
    let err = app.invoices.create(app.user_id, cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut items = standard_items();
    items[0].name = "n".repeat(501);
    let err = app
        .invoices
        .create(app.user_id, draft("FV/T2", items))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut items = standard_items();
    items[1].unit = Some("u".repeat(21));
    let err = app
        .invoices
        .create(app.user_id, draft("FV/T3", items))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(app.store.writes(), 1);
}

#[tokio::test]
async fn manual_buyer_nip_is_validated_and_normalized() {
    let app = spawn_app().await;

    let mut cmd = draft("FV/N1", standard_items());
    cmd.buyer = Some(BuyerSnapshot {
        nip: Some("526025027X".to_string()),
        ..buyer()
    });
    let err = app.invoices.create(app.user_id, cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut cmd = draft("FV/N2", standard_items());
    cmd.buyer = Some(BuyerSnapshot {
        nip: Some("526-025-02-74".to_string()),
        ..buyer()
    });
    let view = app
        .invoices
        .create(app.user_id, cmd)
        .await
        .expect("Failed to create invoice");
    assert_eq!(view.invoice.buyer.nip.as_deref(), Some(VALID_NIP));
}

#[tokio::test]
async fn unsupported_currency_is_rejected() {
    let app = spawn_app().await;

    let mut cmd = draft("FV/EUR", standard_items());
    cmd.currency = Some("EUR".to_string());
    let err = app.invoices.create(app.user_id, cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut cmd = draft("FV/PLN", standard_items());
    cmd.currency = Some("pln".to_string());
    let view = app
        .invoices
        .create(app.user_id, cmd)
        .await
        .expect("Failed to create invoice");
    assert_eq!(view.invoice.currency, "PLN");
}

#[tokio::test]
async fn invalid_items_are_rejected() {
    let app = spawn_app().await;

    let duplicate_positions = vec![
        item(1, "A", "1", "1.00", VatRate::Rate23),
        item(1, "B", "1", "1.00", VatRate::Rate23),
    ];
    let err = app
        .invoices
        .create(app.user_id, draft("FV/I", duplicate_positions))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let zero_quantity = vec![item(1, "A", "0", "1.00", VatRate::Rate23)];
    let err = app
        .invoices
        .create(app.user_id, draft("FV/I", zero_quantity))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn wire_items_reject_unknown_vat_rates() {
    let err = NewInvoiceItem::parse(1, "A", None, "1", "10.00", "7").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let parsed = NewInvoiceItem::parse(1, "A", Some("h".to_string()), "1.5", "10.00", "zw")
        .expect("Failed to parse item");
    assert_eq!(parsed.vat_rate, VatRate::Exempt);
    assert_eq!(parsed.quantity, dec("1.5"));
}

#[tokio::test]
async fn listing_filters_sorts_and_pages() {
    let app = spawn_app().await;
    app.complete_profile().await;

    for (number, day, name) in [
        ("FV/A", 10, "Alfa"),
        ("FV/B", 12, "Beta"),
        ("FV/C", 14, "Gamma"),
    ] {
        let mut cmd = draft(number, standard_items());
        cmd.issue_date = date(2025, 3, day);
        cmd.due_date = date(2025, 3, day);
        cmd.buyer = Some(invoicing_service::models::BuyerSnapshot {
            name: name.to_string(),
            ..buyer()
        });
        app.invoices
            .create(app.user_id, cmd)
            .await
            .expect("Failed to create invoice");
    }

    let page = app
        .invoices
        .find_all(app.user_id, ListInvoicesQuery::default())
        .await
        .expect("Failed to list invoices");
    let numbers: Vec<_> = page.items.iter().map(|v| v.invoice.invoice_number.as_str()).collect();
    assert_eq!(numbers, vec!["FV/C", "FV/B", "FV/A"]);
    assert_eq!(page.total, 3);
    assert_eq!(page.limit, 20);
    assert_eq!(page.items[0].items.len(), 2);

    let page = app
        .invoices
        .find_all(
            app.user_id,
            ListInvoicesQuery {
                search: Some("gAm".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to search invoices");
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].invoice.invoice_number, "FV/C");

    let page = app
        .invoices
        .find_all(
            app.user_id,
            ListInvoicesQuery {
                issued_from: Some(date(2025, 3, 11)),
                limit: 1,
                page: 2,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to page invoices");
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].invoice.invoice_number, "FV/B");
}

#[tokio::test]
async fn invoices_are_invisible_to_other_users() {
    let app = spawn_app().await;
    let other_user = app.another_user().await;

    let view = app
        .invoices
        .create(app.user_id, draft("FV/P", standard_items()))
        .await
        .expect("Failed to create invoice");

    let err = app
        .invoices
        .find_one(other_user, view.invoice.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
