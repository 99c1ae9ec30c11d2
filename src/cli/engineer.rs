use std::{io::Write, time::Duration};

use anyhow::Result;
use chrono::{Local, SecondsFormat, Utc};
use clap::Args as ClapArgs;
use futures::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    api::{
        entities::{
            BreakPayload, BreakType, Location, RequestStatus, ServiceType, ShiftPayload,
            SupportMode, UNKNOWN_LOCATION,
        },
        submission::Submission,
        TrackerApi,
    },
    checkin::{CheckinForm, CheckinSync, CheckinTracker, CheckoutForm},
    report::{format_hh_mm, format_hms, newest_first},
    sync::{shutdown::detect_shutdown, submit::send_or_queue},
    utils::time::format_local_for_db,
};

use super::{
    context::AppContext,
    dates::{parse_range, DateStyle, DATE_EXAMPLES},
    output::{print_checkins, print_requests},
};

const HISTORY_REFRESH: Duration = Duration::from_secs(20);

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct LocationArgs {
    #[arg(long, allow_negative_numbers = true)]
    latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    longitude: Option<f64>,
    #[arg(long, help = "Human readable location, \"Unknown Location\" when omitted")]
    location: Option<String>,
}

impl From<LocationArgs> for Location {
    fn from(value: LocationArgs) -> Self {
        Location {
            latitude: value.latitude,
            longitude: value.longitude,
            location_text: value
                .location
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_LOCATION.into()),
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckinArgs {
    #[arg(long, short, help = "Customer name")]
    customer: String,
    #[arg(long, short = 't', value_enum)]
    service_type: Option<ServiceType>,
    #[arg(long, short = 'm', value_enum)]
    support_mode: Option<SupportMode>,
    #[arg(long, short, default_value = "")]
    note: String,
    #[command(flatten)]
    location: LocationArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckoutArgs {
    #[arg(long, short = 't', value_enum, help = "Defaults to the one picked at check-in")]
    service_type: Option<ServiceType>,
    #[arg(long, short = 'm', value_enum, help = "Defaults to the one picked at check-in")]
    support_mode: Option<SupportMode>,
    #[arg(long, short, default_value = "")]
    note: String,
    #[command(flatten)]
    location: LocationArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ShiftArgs {
    #[arg(long, short, help = "Customer id, see `fieldtrack customers list`")]
    customer: u64,
    #[arg(long, short, help = format!("Start of the shift. {DATE_EXAMPLES}"))]
    start: String,
    #[arg(long, short, help = "End of the shift, now when omitted")]
    end: Option<String>,
    #[arg(long, short = 't', value_enum)]
    service_type: ServiceType,
    #[arg(long, short = 'm', value_enum)]
    support_mode: SupportMode,
    #[arg(long, short, default_value = "")]
    note: String,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct BreakArgs {
    #[arg(long = "type", short = 't', value_enum)]
    kind: BreakType,
    #[arg(long, short, help = format!("Start of the break. {DATE_EXAMPLES}"))]
    start: String,
    #[arg(long, short, help = "End of the break, now when omitted")]
    end: Option<String>,
    #[arg(long, short, default_value = "")]
    note: String,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

fn tracker<'a>(context: &'a AppContext, api: &'a dyn TrackerApi) -> CheckinTracker<'a> {
    CheckinTracker::new(api, &context.session, &context.outbox, context.clock.as_ref())
}

pub async fn checkin(context: &AppContext, api: &dyn TrackerApi, args: CheckinArgs) -> Result<()> {
    let user = context.require_user().await?;
    let tracker = tracker(context, api);
    let form = CheckinForm {
        customer: args.customer,
        service_type: args.service_type,
        support_mode: args.support_mode,
        note: args.note,
        location: args.location.into(),
    };
    let (checkin, delivery) = tracker.check_in(&user, form).await?;
    println!("{}", context.palette.delivery("Check-in", &delivery));
    println!(
        "Checked in at {} since {}",
        context.palette.heading.paint(&checkin.client),
        checkin.started_at.with_timezone(&Local).format("%H:%M:%S")
    );
    Ok(())
}

pub async fn checkout(
    context: &AppContext,
    api: &dyn TrackerApi,
    args: CheckoutArgs,
) -> Result<()> {
    let user = context.require_user().await?;
    let tracker = tracker(context, api);
    let form = CheckoutForm {
        service_type: args.service_type,
        support_mode: args.support_mode,
        note: args.note,
        location: args.location.into(),
    };
    let checked_out = tracker.check_out(&user, form).await?;
    println!("{}", context.palette.delivery("Check-out", &checked_out.delivery));
    println!(
        "Worked {} at {}",
        format_hms(checked_out.worked_seconds),
        context.palette.heading.paint(&checked_out.checkin.client)
    );
    Ok(())
}

/// Shows the running check-in. With `watch` the timer keeps ticking until Ctrl-C.
pub async fn status(context: &AppContext, api: &dyn TrackerApi, watch: bool) -> Result<()> {
    let tracker = tracker(context, api);
    let Some(checkin) = tracker.restore().await? else {
        println!("{}", context.palette.muted.paint("Not checked in"));
        return Ok(());
    };
    let sync = match tracker.sync_state(&checkin).await? {
        CheckinSync::Delivered => String::new(),
        CheckinSync::Waiting => format!(" {}", context.palette.warn.paint("(waiting to sync)")),
        CheckinSync::Rejected(reason) => format!(
            " {}",
            context.palette.bad.paint(format!("(refused by the server: {reason})"))
        ),
    };
    println!(
        "Checked in at {}{sync}",
        context.palette.heading.paint(&checkin.client)
    );

    if !watch {
        println!("{}", format_hms(tracker.elapsed(&checkin)));
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    tokio::join!(
        detect_shutdown(shutdown.clone()),
        tracker.watch(&checkin, &shutdown, |elapsed| {
            print!("\r{}    ", format_hms(elapsed));
            let _ = std::io::stdout().flush();
        })
    );
    println!();
    Ok(())
}

async fn print_history(context: &AppContext, api: &dyn TrackerApi, user_id: u64) -> Result<()> {
    let checkins = newest_first(api.list_checkins(Some(user_id)).await?);
    print_checkins(&context.palette, &checkins, &context.clock.local_time());
    Ok(())
}

/// Own check-ins, newest first. With `watch` the list is fetched again every 20 seconds.
pub async fn history(context: &AppContext, api: &dyn TrackerApi, watch: bool) -> Result<()> {
    let user = context.require_user().await?;
    if !watch {
        return print_history(context, api, user.id).await;
    }

    let mut ticks = IntervalStream::new(tokio::time::interval(HISTORY_REFRESH));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            tick = ticks.next() => {
                if tick.is_none() {
                    return Ok(());
                }
            }
        }
        println!(
            "{}",
            context
                .palette
                .heading
                .paint(format!("History at {}", context.clock.local_time().format("%H:%M:%S")))
        );
        // a failed refresh keeps the loop going, the next tick may succeed
        if let Err(e) = print_history(context, api, user.id).await {
            println!("{}", context.palette.bad.paint(format!("Refresh failed: {e}")));
        }
    }
}

pub async fn shift(context: &AppContext, api: &dyn TrackerApi, args: ShiftArgs) -> Result<()> {
    let user = context.require_user().await?;
    let (start, end) = parse_range(
        &args.start,
        args.end.as_deref(),
        context.clock.local_time(),
        args.date_style,
    )?;
    let payload = ShiftPayload {
        user_id: user.id,
        customer: args.customer,
        start: start.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true),
        end: end.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true),
        hours: format_hh_mm(&start, &end),
        service_type: args.service_type,
        support_mode: args.support_mode,
        note: args.note,
        status: RequestStatus::Pending,
        client_ref: Uuid::new_v4(),
    };
    let hours = payload.hours.clone();
    let delivery = send_or_queue(
        api,
        &context.outbox,
        Submission::Shift(payload),
        context.clock.time(),
    )
    .await?;
    println!("{}", context.palette.delivery(&format!("Shift of {hours}"), &delivery));
    Ok(())
}

pub async fn break_request(
    context: &AppContext,
    api: &dyn TrackerApi,
    args: BreakArgs,
) -> Result<()> {
    let user = context.require_user().await?;
    let (start, end) = parse_range(
        &args.start,
        args.end.as_deref(),
        context.clock.local_time(),
        args.date_style,
    )?;
    let payload = BreakPayload {
        user_id: user.id,
        start: format_local_for_db(&start),
        end: format_local_for_db(&end),
        total_hm: format_hh_mm(&start, &end),
        kind: args.kind,
        note: args.note,
        status: RequestStatus::Pending,
        client_ref: Uuid::new_v4(),
    };
    let total = payload.total_hm.clone();
    let delivery = send_or_queue(
        api,
        &context.outbox,
        Submission::Break(payload),
        context.clock.time(),
    )
    .await?;
    println!("{}", context.palette.delivery(&format!("Break of {total}"), &delivery));
    Ok(())
}

pub async fn requests(context: &AppContext, api: &dyn TrackerApi) -> Result<()> {
    let user = context.require_user().await?;
    let requests = api.my_requests(user.id).await?;
    print_requests(&context.palette, &requests);
    Ok(())
}
