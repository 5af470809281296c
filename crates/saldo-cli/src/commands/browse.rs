//! Interactive transaction browser
//!
//! A line-oriented session over the transaction coordinator: the overview
//! first, then one account's filtered table at a time.

use std::io::Write;

use anyhow::Result;
use saldo_core::coordinator::{TransactionCoordinator, ViewMode};
use saldo_core::filters::{parse_category_selector, parse_type_selector, DateRange};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{render_account_view, render_detail, render_summary, resolve_account, truncate};

const HELP: &str = "\
Commands:
  overview                 Recent activity across accounts
  accounts                 List accounts
  open <n|id|name>         Show one account's transactions
  search <text>            Search descriptions (empty clears)
  category <id|all>        Filter by category
  type <all|credit|debit>  Filter by type
  range <all|today|week|month>
  size <50|100|200|300|500>
  page <n> | next | prev
  clear                    Reset this account's filters
  reload                   Fetch again
  categories               List category ids
  show <row|id>            Transaction details
  close                    Hide details
  quit";

#[derive(Debug, PartialEq, Eq)]
enum BrowseCommand {
    Help,
    Overview,
    Accounts,
    Open(String),
    Search(String),
    Category(String),
    Type(String),
    Range(String),
    Size(String),
    Page(String),
    Next,
    Previous,
    Clear,
    Reload,
    Categories,
    Show(String),
    Close,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<BrowseCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim().to_string()),
        None => (line, String::new()),
    };

    Some(match head.to_lowercase().as_str() {
        "help" | "?" => BrowseCommand::Help,
        "overview" | "o" => BrowseCommand::Overview,
        "accounts" | "a" => BrowseCommand::Accounts,
        "open" => BrowseCommand::Open(rest),
        "search" | "/" => BrowseCommand::Search(rest),
        "category" | "cat" => BrowseCommand::Category(rest),
        "type" => BrowseCommand::Type(rest),
        "range" => BrowseCommand::Range(rest),
        "size" => BrowseCommand::Size(rest),
        "page" => BrowseCommand::Page(rest),
        "next" | "n" => BrowseCommand::Next,
        "prev" | "p" => BrowseCommand::Previous,
        "clear" => BrowseCommand::Clear,
        "reload" | "r" => BrowseCommand::Reload,
        "categories" => BrowseCommand::Categories,
        "show" => BrowseCommand::Show(rest),
        "close" => BrowseCommand::Close,
        "quit" | "q" | "exit" => BrowseCommand::Quit,
        _ => BrowseCommand::Unknown(line.to_string()),
    })
}

fn render_screen(coordinator: &TransactionCoordinator, out: &mut impl Write) -> Result<()> {
    match coordinator.mode() {
        ViewMode::Overview => {
            if coordinator.has_no_accounts() {
                writeln!(out, "No accounts. Link a bank with: saldo sync <item-id>")?;
            }
            render_summary(out, &coordinator.summary_groups())?;
            if let Some(error) = coordinator.summary_error() {
                writeln!(out, "❌ {}", error)?;
            }
        }
        ViewMode::Account(id) => {
            if let Some(view) = coordinator.account_view(&id) {
                render_account_view(out, &view)?;
            }
        }
    }
    if let Some(tx) = coordinator.selected() {
        render_detail(out, &tx)?;
    }
    Ok(())
}

fn active_account(coordinator: &TransactionCoordinator) -> Option<String> {
    match coordinator.mode() {
        ViewMode::Account(id) => Some(id),
        ViewMode::Overview => None,
    }
}

/// Pick an account by 1-based position, id, or name
fn pick_account(coordinator: &TransactionCoordinator, key: &str) -> Result<String> {
    if let Ok(n) = key.parse::<usize>() {
        if let Some(account) = n.checked_sub(1).and_then(|i| coordinator.accounts().get(i).cloned()) {
            return Ok(account.id);
        }
    }
    Ok(resolve_account(coordinator, key)?.id)
}

/// Run one command; returns false when the session should end
async fn execute(
    coordinator: &TransactionCoordinator,
    command: BrowseCommand,
    out: &mut impl Write,
) -> Result<bool> {
    let needs_account = matches!(
        command,
        BrowseCommand::Search(_)
            | BrowseCommand::Category(_)
            | BrowseCommand::Type(_)
            | BrowseCommand::Range(_)
            | BrowseCommand::Size(_)
            | BrowseCommand::Page(_)
            | BrowseCommand::Next
            | BrowseCommand::Previous
            | BrowseCommand::Clear
    );
    let account = active_account(coordinator);
    let id = match (needs_account, account) {
        (true, None) => {
            writeln!(out, "Open an account first (open <n>)")?;
            return Ok(true);
        }
        (_, account) => account.unwrap_or_default(),
    };

    match command {
        BrowseCommand::Help => {
            writeln!(out, "{}", HELP)?;
            return Ok(true);
        }
        BrowseCommand::Quit => return Ok(false),
        BrowseCommand::Unknown(line) => {
            writeln!(out, "Unknown command: {} (try help)", line)?;
            return Ok(true);
        }
        BrowseCommand::Accounts => {
            for (i, account) in coordinator.accounts().iter().enumerate() {
                writeln!(out, "  {}. {} ({})", i + 1, account.name, account.id)?;
            }
            return Ok(true);
        }
        BrowseCommand::Categories => {
            for (value, label) in coordinator.category_options() {
                writeln!(out, "  {:<10} {}", value, truncate(&label, 40))?;
            }
            return Ok(true);
        }
        BrowseCommand::Overview => {
            coordinator.close_detail();
            coordinator.show_overview().await;
        }
        BrowseCommand::Open(key) => {
            let account_id = pick_account(coordinator, &key)?;
            coordinator.close_detail();
            coordinator.show_account(&account_id).await?;
        }
        BrowseCommand::Search(text) => {
            coordinator.set_search(&id, &text)?;
            coordinator.submit_search(&id).await?;
        }
        BrowseCommand::Category(value) => {
            coordinator
                .set_category(&id, parse_category_selector(&value))
                .await?;
        }
        BrowseCommand::Type(value) => {
            coordinator.set_type(&id, parse_type_selector(&value)?).await?;
        }
        BrowseCommand::Range(value) => {
            let range: DateRange = value.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            coordinator.set_date_range(&id, range).await?;
        }
        BrowseCommand::Size(value) => {
            let size: u32 = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Page size must be a number"))?;
            coordinator.set_page_size(&id, size).await?;
        }
        BrowseCommand::Page(value) => {
            let page: u32 = value
                .parse()
                .map_err(|_| anyhow::anyhow!("Page must be a number"))?;
            coordinator.set_page(&id, page).await?;
        }
        BrowseCommand::Next => {
            coordinator.next_page(&id).await?;
        }
        BrowseCommand::Previous => {
            coordinator.previous_page(&id).await?;
        }
        BrowseCommand::Clear => {
            coordinator.clear_filters(&id).await?;
        }
        BrowseCommand::Reload => coordinator.reload().await,
        BrowseCommand::Show(key) => {
            let by_row = key.parse::<usize>().ok().and_then(|n| {
                let view = coordinator.account_view(active_account(coordinator)?.as_str())?;
                view.transactions.get(n.checked_sub(1)?).cloned()
            });
            match by_row {
                Some(tx) => coordinator.select_transaction(tx),
                None => {
                    coordinator.select_transaction_by_id(&key)?;
                }
            }
        }
        BrowseCommand::Close => coordinator.close_detail(),
    }

    render_screen(coordinator, out)?;
    Ok(true)
}

pub async fn cmd_browse<R, W>(coordinator: &TransactionCoordinator, input: R, mut out: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    coordinator.load_categories().await;
    coordinator.show_overview().await;
    render_screen(coordinator, &mut out)?;
    writeln!(out, "Type 'help' for commands.")?;

    let mut lines = input.lines();
    loop {
        write!(out, "saldo> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };

        match execute(coordinator, command, &mut out).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => writeln!(out, "❌ {}", e)?,
        }
    }

    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("   "), None);
        assert_eq!(
            parse_command("open 2"),
            Some(BrowseCommand::Open("2".into()))
        );
        assert_eq!(
            parse_command("search  padaria central "),
            Some(BrowseCommand::Search("padaria central".into()))
        );
        assert_eq!(parse_command("search"), Some(BrowseCommand::Search(String::new())));
        assert_eq!(parse_command("N"), Some(BrowseCommand::Next));
        assert_eq!(parse_command("q"), Some(BrowseCommand::Quit));
        assert_eq!(
            parse_command("dance"),
            Some(BrowseCommand::Unknown("dance".into()))
        );
    }
}
