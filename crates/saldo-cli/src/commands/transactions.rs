//! Transaction commands (categories, transactions, summary) and table rendering

use std::io::Write;

use anyhow::{anyhow, Result};
use saldo_core::aggregator::{AggregatorBackend, AggregatorClient};
use saldo_core::coordinator::{AccountView, SummaryGroup, TransactionCoordinator};
use saldo_core::filters::{parse_category_selector, parse_type_selector, DateRange};
use saldo_core::models::Transaction;

use super::{format_amount, resolve_account, truncate};

pub async fn cmd_categories(aggregator: &AggregatorClient) -> Result<()> {
    let categories = aggregator.list_categories().await?;

    println!();
    println!("{:<10} {:<32} {:<10}", "ID", "NAME", "PARENT");
    println!("{}", "-".repeat(54));
    for category in &categories {
        println!(
            "{:<10} {:<32} {:<10}",
            category.id,
            truncate(category.display_name(), 32),
            category.parent_id.as_deref().unwrap_or("")
        );
    }
    println!();
    println!("{} categories", categories.len());
    Ok(())
}

/// Apply the requested filters, then fetch the account's page once
pub async fn cmd_transactions(
    coordinator: &TransactionCoordinator,
    args: &crate::cli::TransactionsArgs,
) -> Result<()> {
    let account = resolve_account(coordinator, &args.account)?;
    let id = account.id.as_str();

    // Still in the overview here, so none of these fetch
    if let Some(size) = args.page_size {
        coordinator.set_page_size(id, size).await?;
    }
    if let Some(ref category) = args.category {
        coordinator
            .set_category(id, parse_category_selector(category))
            .await?;
    }
    if let Some(ref kind) = args.kind {
        coordinator.set_type(id, parse_type_selector(kind)?).await?;
    }
    if let Some(ref range) = args.range {
        let range: DateRange = range.parse().map_err(|e: String| anyhow!(e))?;
        coordinator.set_date_range(id, range).await?;
    }
    if let Some(ref search) = args.search {
        coordinator.set_search(id, search)?;
        coordinator.submit_search(id).await?;
    }
    coordinator.set_page(id, args.page).await?;

    coordinator.show_account(id).await?;

    // Now that the page count is known, an out-of-range page clamps
    let page = coordinator.set_page(id, args.page).await?;
    if page != args.page {
        eprintln!("Page {} is out of range, showing page {}", args.page, page);
    }

    let view = coordinator
        .account_view(id)
        .ok_or_else(|| anyhow!("Account not found: {}", id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        render_account_view(&mut std::io::stdout().lock(), &view)?;
    }

    match view.error {
        Some(error) => Err(anyhow!(error)),
        None => Ok(()),
    }
}

pub async fn cmd_summary(coordinator: &TransactionCoordinator, json: bool) -> Result<()> {
    if coordinator.has_no_accounts() {
        println!("No accounts. Link a bank with: saldo sync <item-id>");
        return Ok(());
    }

    coordinator.show_overview().await;
    let groups = coordinator.summary_groups();

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
    } else {
        render_summary(&mut std::io::stdout().lock(), &groups)?;
    }

    match coordinator.summary_error() {
        Some(error) => Err(anyhow!(error)),
        None => Ok(()),
    }
}

fn transaction_row(out: &mut impl Write, tx: &Transaction) -> std::io::Result<()> {
    writeln!(
        out,
        "  {}  {:<36} {:<20} {:>16}",
        tx.date.format("%Y-%m-%d"),
        truncate(&tx.description, 36),
        truncate(tx.category_label(), 20),
        format_amount(tx.amount, tx.currency_code.as_deref().unwrap_or("BRL"))
    )
}

/// One account's filtered table with its pagination footer
pub fn render_account_view(out: &mut impl Write, view: &AccountView) -> std::io::Result<()> {
    let filters = &view.filters;
    writeln!(out)?;
    writeln!(out, "💳 {}", view.account_name)?;
    writeln!(
        out,
        "   search: {:?}  category: {}  type: {}  range: {}  page size: {}",
        filters.search,
        filters.category_selector(),
        filters.type_selector(),
        filters.date_range,
        filters.page_size
    )?;
    writeln!(out, "{}", "-".repeat(90))?;

    if let Some(ref error) = view.error {
        writeln!(out, "  ❌ {}", error)?;
        return Ok(());
    }
    if view.transactions.is_empty() {
        writeln!(out, "  No transactions found")?;
    }
    for tx in &view.transactions {
        transaction_row(out, tx)?;
    }

    let pagination = &view.pagination;
    if pagination.is_visible() {
        writeln!(out, "{}", "-".repeat(90))?;
        let shown = pagination
            .showing()
            .map(|(start, end)| format!("{}-{} of {}", start, end, pagination.total))
            .unwrap_or_else(|| "0 results".to_string());
        writeln!(
            out,
            "  {}  page {}/{}{}{}",
            shown,
            pagination.page,
            pagination.last_page(),
            if pagination.has_previous() { "  [prev]" } else { "" },
            if pagination.has_next() { "  [next]" } else { "" }
        )?;
    }
    Ok(())
}

/// Recent activity grouped by account
pub fn render_summary(out: &mut impl Write, groups: &[SummaryGroup]) -> std::io::Result<()> {
    for group in groups {
        writeln!(out)?;
        writeln!(out, "💳 {}", group.account_name)?;
        if let Some(ref error) = group.error {
            writeln!(out, "  ❌ {}", error)?;
            continue;
        }
        if group.transactions.is_empty() {
            writeln!(out, "  No recent transactions")?;
        }
        for tx in &group.transactions {
            transaction_row(out, tx)?;
        }
    }
    Ok(())
}

/// Every detail the aggregator reported for one transaction
pub fn render_detail(out: &mut impl Write, tx: &Transaction) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "🧾 {}", tx.description)?;
    writeln!(out, "   id:        {}", tx.id)?;
    writeln!(out, "   date:      {}", tx.date.format("%Y-%m-%d %H:%M"))?;
    writeln!(
        out,
        "   amount:    {} ({})",
        format_amount(tx.amount, tx.currency_code.as_deref().unwrap_or("BRL")),
        tx.transaction_type
    )?;
    writeln!(out, "   category:  {}", tx.category_label())?;
    if let Some(ref account) = tx.account_name {
        writeln!(out, "   account:   {}", account)?;
    }
    if let Some(ref raw) = tx.description_raw {
        writeln!(out, "   raw:       {}", raw)?;
    }
    if let Some(ref status) = tx.status {
        writeln!(out, "   status:    {}", status)?;
    }
    if let Some(balance) = tx.balance {
        writeln!(out, "   balance:   {:.2}", balance)?;
    }
    if let Some(ref card) = tx.credit_card_metadata {
        if let (Some(n), Some(total)) = (card.installment_number, card.total_installments) {
            writeln!(out, "   installment: {}/{}", n, total)?;
        }
    }
    if let Some(ref payment) = tx.payment_data {
        if let Some(ref method) = payment.payment_method {
            writeln!(out, "   payment:   {}", method)?;
        }
        if let Some(name) = payment.receiver.as_ref().and_then(|r| r.name.as_ref()) {
            writeln!(out, "   receiver:  {}", name)?;
        }
        if let Some(name) = payment.payer.as_ref().and_then(|p| p.name.as_ref()) {
            writeln!(out, "   payer:     {}", name)?;
        }
    }
    if let Some(ref merchant) = tx.merchant {
        writeln!(out, "   merchant:  {} ({})", merchant.business_name, merchant.cnpj)?;
    }
    Ok(())
}
