use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    api::{
        entities::{CheckinPayload, Location, ServiceType, SupportMode, User},
        submission::Submission,
        TrackerApi,
    },
    storage::{
        outbox::{DeliveryState, Outbox},
        session::{ActiveCheckin, CheckinContext, SessionStore},
    },
    sync::submit::{queue_behind, send_or_queue, Delivery},
    utils::{clock::Clock, time::format_local_for_db},
};

use super::{CheckedOut, CheckinError, CheckinForm, CheckinSync, CheckoutForm};

const TICK: Duration = Duration::from_secs(1);

pub struct CheckinTracker<'a> {
    api: &'a dyn TrackerApi,
    session: &'a SessionStore,
    outbox: &'a Outbox,
    clock: &'a dyn Clock,
}

impl<'a> CheckinTracker<'a> {
    pub fn new(
        api: &'a dyn TrackerApi,
        session: &'a SessionStore,
        outbox: &'a Outbox,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            api,
            session,
            outbox,
            clock,
        }
    }

    /// The check-in left running by a previous run, if any.
    pub async fn restore(&self) -> Result<Option<ActiveCheckin>, CheckinError> {
        Ok(self.session.active_checkin().await?)
    }

    pub fn elapsed(&self, checkin: &ActiveCheckin) -> i64 {
        checkin.elapsed_seconds(self.clock.time())
    }

    /// Looks the check-in up in the outbox. Once the entry is gone it has been delivered.
    pub async fn sync_state(&self, checkin: &ActiveCheckin) -> Result<CheckinSync, CheckinError> {
        let Some(id) = checkin.context.as_ref().and_then(|c| c.queued_ref) else {
            return Ok(CheckinSync::Delivered);
        };
        Ok(match self.outbox.get(id).await? {
            None => CheckinSync::Delivered,
            Some(entry) => match entry.state {
                DeliveryState::Pending => CheckinSync::Waiting,
                DeliveryState::Rejected => CheckinSync::Rejected(
                    entry.last_error.unwrap_or_else(|| "rejected".into()),
                ),
            },
        })
    }

    fn payload(
        &self,
        user: &User,
        client: String,
        service_type: ServiceType,
        support_mode: SupportMode,
        note: String,
        location: Location,
    ) -> CheckinPayload {
        CheckinPayload {
            user_id: user.id,
            name: user.name.clone(),
            client,
            service_type,
            support_mode,
            note,
            latitude: location.latitude,
            longitude: location.longitude,
            location_text: location.location_text,
            client_time: format_local_for_db(&self.clock.local_time()),
            client_ref: Uuid::new_v4(),
        }
    }

    pub async fn check_in(
        &self,
        user: &User,
        form: CheckinForm,
    ) -> Result<(ActiveCheckin, Delivery), CheckinError> {
        if let Some(active) = self.restore().await? {
            return Err(CheckinError::AlreadyCheckedIn {
                client: active.client,
            });
        }
        let customer = form.customer.trim().to_string();
        if customer.is_empty() {
            return Err(CheckinError::MissingField("customer"));
        }
        let service_type = form
            .service_type
            .ok_or(CheckinError::MissingField("service type"))?;
        let support_mode = form
            .support_mode
            .ok_or(CheckinError::MissingField("support mode"))?;

        let payload = self.payload(
            user,
            customer.clone(),
            service_type,
            support_mode,
            form.note,
            form.location,
        );
        let now = self.clock.time();
        let delivery =
            send_or_queue(self.api, self.outbox, Submission::CheckIn(payload), now).await?;

        let checkin = ActiveCheckin {
            client: customer,
            started_at: now,
            context: Some(CheckinContext {
                service_type,
                support_mode,
                queued_ref: match &delivery {
                    Delivery::Queued(entry) => Some(entry.id),
                    Delivery::Sent => None,
                },
            }),
        };
        self.session.save_active_checkin(&checkin).await?;
        info!("Checked in at {}", checkin.client);
        Ok((checkin, delivery))
    }

    pub async fn check_out(
        &self,
        user: &User,
        form: CheckoutForm,
    ) -> Result<CheckedOut, CheckinError> {
        let checkin = self.restore().await?.ok_or(CheckinError::NotCheckedIn)?;
        let sync = self.sync_state(&checkin).await?;
        if let CheckinSync::Rejected(reason) = sync {
            self.session.clear_active_checkin().await?;
            warn!("Dropped check-in at {} refused by the server", checkin.client);
            return Err(CheckinError::CheckinRejected {
                client: checkin.client,
                reason,
            });
        }
        let context = checkin.context.as_ref();
        let service_type = form
            .service_type
            .or(context.map(|c| c.service_type))
            .ok_or(CheckinError::MissingField("service type"))?;
        let support_mode = form
            .support_mode
            .or(context.map(|c| c.support_mode))
            .ok_or(CheckinError::MissingField("support mode"))?;

        let payload = self.payload(
            user,
            checkin.client.clone(),
            service_type,
            support_mode,
            form.note,
            form.location,
        );
        let now = self.clock.time();
        let submission = Submission::CheckOut(payload);
        let delivery = if sync == CheckinSync::Waiting {
            // the check-in has not reached the server yet
            queue_behind(self.outbox, submission, now).await?
        } else {
            send_or_queue(self.api, self.outbox, submission, now).await?
        };

        self.session.clear_active_checkin().await?;
        let worked_seconds = checkin.elapsed_seconds(now);
        info!("Checked out from {} after {worked_seconds}s", checkin.client);
        Ok(CheckedOut {
            checkin,
            worked_seconds,
            delivery,
        })
    }

    /// Calls `on_tick` with the elapsed seconds right away and then once a second until
    /// `shutdown` is cancelled.
    pub async fn watch(
        &self,
        checkin: &ActiveCheckin,
        shutdown: &CancellationToken,
        mut on_tick: impl FnMut(i64),
    ) {
        let mut tick_point = self.clock.instant();
        loop {
            on_tick(self.elapsed(checkin));
            tick_point += TICK;

            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Stopped watching check-in at {}", checkin.client);
                    return
                }
                _ = self.clock.sleep_until(tick_point) => ()
            }
        }
    }
}
