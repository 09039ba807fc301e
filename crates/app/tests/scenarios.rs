use chrono::NaiveDate;
use std::sync::Arc;
use tally::AppContext;
use tally_classify::{ClassificationEngine, KeywordClassifier, NoResearch, PatternStore, ResponseCache};
use tally_core::{ExpenseType, Money, MonthBucket, Settings, TransactionStore, ValidationError};
use tally_import::ImportFile;

async fn context() -> AppContext {
    let pool = tally_storage::create_in_memory().await.unwrap();
    AppContext::new(Settings::default(), pool, KeywordClassifier::builtin())
        .await
        .unwrap()
}

fn csv(body: &str) -> ImportFile {
    ImportFile::new("export.csv", body.as_bytes().to_vec())
}

const STATEMENT: &str = "dateOp;dateVal;label;category;amount;accountNum\n\
    2025-03-03;2025-03-04;CARTE 01/03/25 FRANPRIX CB*8533;Alimentation;-23,40;0001\n\
    2025-03-05;2025-03-05;PRLV SEPA ORANGE;Telecom;-39,99;0001\n\
    2025-03-12;2025-03-12;CARTE 12/03/25 POKAWA CB*8533;Restaurants;-13,90;0001\n\
    2025-03-28;2025-03-28;VIR SALAIRE ACME;Salaire;2 450,00;0001\n";

// ── import ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reimporting_the_same_file_inserts_nothing() {
    let ctx = context().await;

    let first = ctx.analyze(&csv(STATEMENT)).await.unwrap();
    let inserted = ctx.confirm(first.import_id).await.unwrap();
    assert_eq!(inserted.inserted_count, 4);

    let second = ctx.analyze(&csv(STATEMENT)).await.unwrap();
    let again = ctx.confirm(second.import_id).await.unwrap();
    assert_eq!(again.inserted_count, 0);
    assert_eq!(again.duplicate_count, 4);
    assert_eq!(ctx.transactions().await.unwrap().len(), 4);
}

#[tokio::test]
async fn three_row_file_with_one_repeat() {
    let ctx = context().await;
    let body = "date;libellé;montant\n\
        10/02/2025;BOULANGERIE MARIE;-4,20\n\
        10/02/2025;BOULANGERIE MARIE;-4,20\n\
        11/02/2025;SNCF INTERNET;-56,00\n";

    let preview = ctx.analyze(&csv(body)).await.unwrap();
    let february: MonthBucket = "2025-02".parse().unwrap();
    assert_eq!(preview.per_month_new_count[&february], 2);
    assert_eq!(preview.per_month_duplicate_count[&february], 1);
    assert_eq!(preview.suggested_month, Some(february));

    let result = ctx.confirm(preview.import_id).await.unwrap();
    assert_eq!(result.inserted_count, 2);
    assert_eq!(ctx.transactions().await.unwrap().len(), 2);

    let repeat = ctx.confirm(preview.import_id).await.unwrap();
    assert!(repeat.already_confirmed);
    assert_eq!(repeat.inserted_count, 0);
}

#[tokio::test]
async fn label_dates_decide_the_month() {
    let ctx = context().await;
    let preview = ctx.analyze(&csv(STATEMENT)).await.unwrap();
    // FRANPRIX is booked on the 3rd but the card was used on the 1st.
    assert_eq!(preview.reconciled_dates, 1);
    ctx.confirm(preview.import_id).await.unwrap();

    let franprix = ctx
        .transactions()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.label.contains("FRANPRIX"))
        .unwrap();
    assert_eq!(franprix.operation_date(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    assert_eq!(franprix.category.as_deref(), Some("Alimentation"));
    assert_eq!(franprix.account.as_deref(), Some("0001"));
}

#[tokio::test]
async fn hostile_cells_become_warnings() {
    let ctx = context().await;
    let body = "dateOp;label;amount\n\
        1e300;HUGE SERIAL;-1,00\n\
        2025-04-02;HUGE AMOUNT;50000000000000000000000000000\n\
        20250403;COMPACT DATE;-2,00\n";

    let preview = ctx.analyze(&csv(body)).await.unwrap();
    assert_eq!(preview.warnings.len(), 2);
    assert!(preview
        .warnings
        .iter()
        .any(|w| matches!(w, ValidationError::InvalidDate { value, .. } if value == "1e300")));
    assert!(preview
        .warnings
        .iter()
        .any(|w| matches!(w, ValidationError::InvalidAmount { .. })));

    let april: MonthBucket = "2025-04".parse().unwrap();
    assert_eq!(preview.detected_months, vec![april]);
    assert_eq!(preview.per_month_new_count[&april], 1);
}

#[tokio::test]
async fn listing_a_month_reads_only_that_month() {
    let ctx = context().await;
    let body = "date;libellé;montant\n\
        30/01/2025;LOYER JANVIER;-800,00\n\
        02/02/2025;BOULANGERIE MARIE;-4,20\n\
        03/02/2025;SNCF INTERNET;-56,00\n";
    let preview = ctx.analyze(&csv(body)).await.unwrap();
    ctx.confirm(preview.import_id).await.unwrap();

    let february: MonthBucket = "2025-02".parse().unwrap();
    let rows = ctx.transactions_in_month(february).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|t| t.month() == february));
}

#[tokio::test]
async fn dedup_cleanup_removes_stored_repeats() {
    let ctx = context().await;
    let a = tally_core::Transaction::new(
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        "CARTE FRANPRIX CB*8533",
        Money::from_cents(-500),
    );
    let b = tally_core::Transaction::new(
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
        "CARTE FRANPRIX CB*1234",
        Money::from_cents(-500),
    );
    ctx.store().insert_transactions(&[a.clone(), b]).await.unwrap();

    assert_eq!(ctx.remove_duplicates().await.unwrap(), 1);
    let left = ctx.transactions().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, a.id);
}

// ── classification and learning ───────────────────────────────────────────────

#[tokio::test]
async fn correction_teaches_future_classifications() {
    let ctx = context().await;
    let preview = ctx.analyze(&csv(STATEMENT)).await.unwrap();
    ctx.confirm(preview.import_id).await.unwrap();

    let before = ctx.classify("CB POKAWA PARIS 11", Money::from_cents(-1290)).await;
    assert!(before.is_unknown());

    let pokawa = ctx
        .transactions()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.label.contains("POKAWA"))
        .unwrap();
    ctx.correct(pokawa.id, "restaurant", Some(ExpenseType::Variable))
        .await
        .unwrap();

    let stored = ctx.store().transaction(pokawa.id).await.unwrap();
    assert!(stored.tags.contains("restaurant"));

    let after = ctx.classify("CARTE 20/04/25 POKAWA CB*0001", Money::from_cents(-1290)).await;
    assert_eq!(after.tag.as_deref(), Some("restaurant"));
    assert!(after.confidence >= ctx.settings().classify.trusted_threshold);
}

#[tokio::test]
async fn newer_correction_replaces_older() {
    let ctx = context().await;
    let preview = ctx.analyze(&csv(STATEMENT)).await.unwrap();
    ctx.confirm(preview.import_id).await.unwrap();
    let salary = ctx
        .transactions()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.label.contains("SALAIRE"))
        .unwrap();

    ctx.correct(salary.id, "income", None).await.unwrap();
    let pattern = ctx.correct(salary.id, "salary", None).await.unwrap();
    assert_eq!(pattern.tag, "salary");
    assert_eq!(pattern.usage_count, 1);
    assert_eq!(
        ctx.engine().patterns().lookup(&pattern.merchant_token).unwrap().tag,
        "salary"
    );
}

#[tokio::test]
async fn learned_patterns_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let token;
    {
        let ctx = AppContext::open(dir.path()).await.unwrap();
        let preview = ctx.analyze(&csv(STATEMENT)).await.unwrap();
        ctx.confirm(preview.import_id).await.unwrap();
        let pokawa = ctx
            .transactions()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.label.contains("POKAWA"))
            .unwrap();
        token = ctx.correct(pokawa.id, "restaurant", None).await.unwrap().merchant_token;
        ctx.store().pool().close().await;
    }

    let reopened = AppContext::open(dir.path()).await.unwrap();
    let pattern = reopened.engine().patterns().require(&token).unwrap();
    assert_eq!(pattern.tag, "restaurant");
    assert_eq!(reopened.transactions().await.unwrap().len(), 4);
}

#[tokio::test]
async fn tag_untagged_fills_tags_and_stats() {
    let ctx = context().await;
    let preview = ctx.analyze(&csv(STATEMENT)).await.unwrap();
    ctx.confirm(preview.import_id).await.unwrap();

    // FRANPRIX and ORANGE are known businesses; POKAWA and the salary are not.
    assert_eq!(ctx.tag_untagged().await.unwrap(), 2);
    assert_eq!(ctx.tag_untagged().await.unwrap(), 0);

    let stats = ctx.tag_statistics().await.unwrap();
    let telecom = &stats["telecom"];
    assert_eq!(telecom.transaction_count, 1);
    assert_eq!(telecom.total_amount, Money::from_cents(-3999));
    assert_eq!(telecom.expense_types.fixed, 1);
    assert_eq!(stats["groceries"].expense_types.variable, 1);
}

#[tokio::test]
async fn batch_and_single_classification_agree() {
    let settings = Settings::default();
    let patterns = Arc::new(PatternStore::new(settings.learning.clone()));
    patterns.seed(tally_classify::default_seeds());
    let engine = ClassificationEngine::new(
        &settings,
        patterns,
        KeywordClassifier::builtin(),
        Arc::new(NoResearch),
        Arc::new(ResponseCache::new()),
    );

    let labels = ["PRLV SEPA EDF", "NETFLIX.COM", "CARTE X1234 IKEA", "??", "UBER EATS"];
    let items = labels
        .iter()
        .map(|l| (l.to_string(), Money::from_cents(-1000)))
        .collect();
    let batch = engine.classify_batch(items).await;
    for (label, result) in labels.iter().zip(batch) {
        assert_eq!(result, engine.classify(label, Money::from_cents(-1000)).await);
    }
}
