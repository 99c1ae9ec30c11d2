use anyhow::{bail, Result};
use clap::Subcommand;
use tracing::info;

use crate::{
    api::{
        dashboard_summary,
        entities::{ApprovalAction, WeeklyActivity},
        TrackerApi,
    },
    report::{
        customers::search_customers,
        format_hms, newest_first,
        weekly::{unique_employees, weekly_checkin_counts, weekly_total},
    },
};

use super::{
    context::AppContext,
    output::{format_time, print_checkins, print_requests, Palette},
};

#[derive(Subcommand, Debug, Clone)]
pub enum CustomerCommand {
    #[command(about = "List customers, 10 per page")]
    List {
        #[arg(long, short, help = "Only customers whose name contains this text")]
        search: Option<String>,
        #[arg(long, short, default_value_t = 1)]
        page: usize,
    },
    #[command(about = "Create a customer (admin)")]
    Create { name: String },
    #[command(about = "Rename a customer (admin)")]
    Update { id: u64, name: String },
    #[command(about = "Delete a customer (admin)")]
    Delete { id: u64 },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ApprovalCommand {
    #[command(about = "List shift and break requests")]
    List {
        #[arg(long, help = "Only requests that still need a decision")]
        pending: bool,
    },
    #[command(about = "Approve a request")]
    Approve { id: u64 },
    #[command(about = "Reject a request")]
    Reject { id: u64 },
}

fn non_empty_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Customer name can't be empty");
    }
    Ok(name)
}

pub async fn customers(
    context: &AppContext,
    api: &dyn TrackerApi,
    command: CustomerCommand,
) -> Result<()> {
    match command {
        CustomerCommand::List { search, page } => {
            context.require_user().await?;
            let list = api.list_customers().await?;
            let page = search_customers(&list, search.as_deref().unwrap_or(""), page);
            for customer in &page.customers {
                println!("{}\t{}", customer.id, customer.name);
            }
            println!(
                "{}",
                context.palette.muted.paint(format!(
                    "Page {}/{}, {} customers",
                    page.page, page.total_pages, page.total_matches
                ))
            );
        }
        CustomerCommand::Create { name } => {
            context.require_admin().await?;
            let name = non_empty_name(&name)?;
            api.create_customer(name).await?;
            info!("Created customer {name}");
            println!("Created {name}");
        }
        CustomerCommand::Update { id, name } => {
            context.require_admin().await?;
            let name = non_empty_name(&name)?;
            api.update_customer(id, name).await?;
            println!("Renamed #{id} to {name}");
        }
        CustomerCommand::Delete { id } => {
            context.require_admin().await?;
            api.delete_customer(id).await?;
            info!("Deleted customer {id}");
            println!("Deleted #{id}");
        }
    }
    Ok(())
}

pub async fn approvals(
    context: &AppContext,
    api: &dyn TrackerApi,
    command: ApprovalCommand,
) -> Result<()> {
    context.require_admin().await?;
    let (id, action) = match command {
        ApprovalCommand::List { pending } => {
            let mut requests = api.list_approvals().await?;
            if pending {
                requests.retain(|r| r.is_pending());
            }
            print_requests(&context.palette, &requests);
            return Ok(());
        }
        ApprovalCommand::Approve { id } => (id, ApprovalAction::Approved),
        ApprovalCommand::Reject { id } => (id, ApprovalAction::Rejected),
    };
    api.decide_approval(id, action).await?;
    info!("Request {id} {action:?}");
    let style = match action {
        ApprovalAction::Approved => context.palette.good,
        ApprovalAction::Rejected => context.palette.bad,
    };
    println!("{}", style.paint(format!("Request #{id} {action:?}")));
    Ok(())
}

/// Without `employee`: everybody who checked in, with their week so far. With it: that
/// employee's check-ins, newest first.
pub async fn checkins(
    context: &AppContext,
    api: &dyn TrackerApi,
    employee: Option<u64>,
) -> Result<()> {
    context.require_admin().await?;
    let now = context.clock.local_time();
    let palette = &context.palette;

    match employee {
        None => {
            let list = api.list_checkins(None).await?;
            for record in unique_employees(&list) {
                println!(
                    "{}\t{}\tlast {} at {}\tweek {}",
                    record.user_id,
                    palette.heading.paint(record.display_name()),
                    format_time(Some(record.check_in_time)),
                    record.client,
                    format_hms(weekly_total(&list, record.user_id, &now)),
                );
            }
        }
        Some(user_id) => {
            let list = api.list_checkins(Some(user_id)).await?;
            println!(
                "{}",
                palette.heading.paint(format!(
                    "This week {}",
                    format_hms(weekly_total(&list, user_id, &now))
                ))
            );
            print_checkins(palette, &newest_first(list), &now);
        }
    }
    Ok(())
}

const BAR_WIDTH: u64 = 30;

fn print_activity(palette: &Palette, activity: &WeeklyActivity) {
    if activity.labels.is_empty() {
        println!("{}", palette.muted.paint("No activity this week"));
        return;
    }
    let width = activity.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let top = activity.data.iter().copied().max().unwrap_or(0).max(1);
    for (label, count) in activity.labels.iter().zip(&activity.data) {
        let bar = "#".repeat(bar_length(*count, top));
        println!("{label:width$}  {}  {count}", palette.good.paint(bar));
    }
}

fn bar_length(count: u64, top: u64) -> usize {
    ((count.min(top) as f64 / top as f64) * BAR_WIDTH as f64).round() as usize
}

pub async fn dashboard(context: &AppContext, api: &dyn TrackerApi) -> Result<()> {
    context.require_admin().await?;
    let (summary, feed, activity, requests) = futures::try_join!(
        dashboard_summary(api),
        api.activity_feed(),
        api.weekly_activity(),
        api.list_approvals()
    )?;
    let palette = &context.palette;
    println!("{}", palette.heading.paint("Dashboard"));
    println!("Employees\t{}", summary.total_employees);
    println!("Customers\t{}", summary.total_customers);
    println!("Shifts today\t{}", summary.shifts_today);

    println!();
    println!("{}", palette.heading.paint("Weekly activity"));
    print_activity(palette, &activity);

    println!();
    println!("{}", palette.heading.paint("Requests"));
    print_requests(palette, &requests);

    if !feed.is_empty() {
        println!();
        println!("{}", palette.heading.paint("Recent activity"));
        for item in feed {
            println!("{}\t{}", format_time(item.time), item.title);
        }
    }
    Ok(())
}

/// Check-ins per person this week, as reported by the server or counted from the check-in list.
pub async fn activity(
    context: &AppContext,
    api: &dyn TrackerApi,
    from_checkins: bool,
) -> Result<()> {
    context.require_admin().await?;
    let activity = if from_checkins {
        let list = api.list_checkins(None).await?;
        weekly_checkin_counts(&list, &context.clock.local_time())
    } else {
        api.weekly_activity().await?
    };
    print_activity(&context.palette, &activity);
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use mockall::predicate::eq;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::{
        api::{
            entities::{ApprovalAction, Customer, Role, WeeklyActivity},
            MockTrackerApi,
        },
        cli::context::test_context::logged_in,
    };

    use super::{
        activity, approvals, bar_length, customers, dashboard, ApprovalCommand, CustomerCommand,
    };

    #[tokio::test]
    async fn engineers_cannot_manage_customers() -> Result<()> {
        let dir = tempdir()?;
        let context = logged_in(dir.path(), Role::Engineer).await?;
        let mut api = MockTrackerApi::new();
        api.expect_create_customer().never();
        api.expect_list_customers().times(1).returning(|| {
            Ok(vec![Customer {
                id: 1,
                name: "Acme".into(),
            }])
        });

        let result = customers(
            &context,
            &api,
            CustomerCommand::Create {
                name: "Contoso".into(),
            },
        )
        .await;
        assert!(result.is_err());

        customers(
            &context,
            &api,
            CustomerCommand::List {
                search: None,
                page: 1,
            },
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn admin_creates_trimmed_customer() -> Result<()> {
        let dir = tempdir()?;
        let context = logged_in(dir.path(), Role::Admin).await?;
        let mut api = MockTrackerApi::new();
        api.expect_create_customer()
            .with(eq("Contoso"))
            .times(1)
            .returning(|_| Ok(()));

        customers(
            &context,
            &api,
            CustomerCommand::Create {
                name: "  Contoso ".into(),
            },
        )
        .await?;

        let blank = customers(&context, &api, CustomerCommand::Create { name: " ".into() }).await;
        assert!(blank.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn approve_and_reject() -> Result<()> {
        let dir = tempdir()?;
        let context = logged_in(dir.path(), Role::Superadmin).await?;
        let mut api = MockTrackerApi::new();
        api.expect_decide_approval()
            .with(eq(12u64), eq(ApprovalAction::Approved))
            .times(1)
            .returning(|_, _| Ok(()));
        api.expect_decide_approval()
            .with(eq(13u64), eq(ApprovalAction::Rejected))
            .times(1)
            .returning(|_, _| Ok(()));

        approvals(&context, &api, ApprovalCommand::Approve { id: 12 }).await?;
        approvals(&context, &api, ApprovalCommand::Reject { id: 13 }).await?;
        Ok(())
    }

    #[tokio::test]
    async fn dashboard_and_activity() -> Result<()> {
        let dir = tempdir()?;
        let context = logged_in(dir.path(), Role::Admin).await?;
        let mut api = MockTrackerApi::new();
        api.expect_engineer_count().returning(|| Ok(4));
        api.expect_list_customers().returning(|| Ok(vec![]));
        api.expect_todays_shifts()
            .returning(|| Ok(vec![json!({"id": 1}), json!({"id": 2})]));
        api.expect_activity_feed().returning(|| Ok(vec![]));
        api.expect_weekly_activity().times(2).returning(|| {
            Ok(WeeklyActivity {
                labels: vec!["jordan".into(), "sam".into()],
                data: vec![3, 0],
            })
        });
        api.expect_list_checkins().returning(|_| Ok(vec![]));
        api.expect_list_approvals().times(1).returning(|| Ok(vec![]));

        dashboard(&context, &api).await?;
        activity(&context, &api, false).await?;
        activity(&context, &api, true).await?;
        Ok(())
    }

    #[test]
    fn bars_scale_to_the_busiest_person() {
        assert_eq!(bar_length(0, 1), 0);
        assert_eq!(bar_length(3, 6), 15);
        assert_eq!(bar_length(6, 6), 30);
        assert_eq!(bar_length(u64::MAX, u64::MAX), 30);
        assert_eq!(bar_length(u64::MAX / 2, u64::MAX), 15);
    }
}
