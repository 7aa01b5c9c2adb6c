use async_trait::async_trait;
use cirrus_core::provider::ProviderResult;
use cirrus_core::resource::Value;
use cirrus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema};

use super::API_VERSION;
use super::models::{ScheduleItem, StartStopManagedInstanceSchedule, StartStopScheduleProperties};
use crate::ids::{ManagedInstanceId, ManagedInstanceStartStopScheduleId, id_type};
use crate::resources::{
    Attributes, Attrs, AzureResource, ProviderContext, api_error, blocks, ensure_absent,
    get_existing, parse_error, set,
};
use crate::validate;

/// The only schedule name the API accepts
const SCHEDULE_NAME: &str = "default";

pub struct ManagedInstanceStartStopScheduleResource;

fn schedule_block() -> AttributeType {
    BlockSchema::new()
        .attribute(AttributeSchema::new("start_day", validate::day_of_week()).required())
        .attribute(AttributeSchema::new("start_time", validate::time_of_day()).required())
        .attribute(AttributeSchema::new("stop_day", validate::day_of_week()).required())
        .attribute(AttributeSchema::new("stop_time", validate::time_of_day()).required())
        .into_type()
}

fn expand(attrs: Attrs<'_>) -> StartStopManagedInstanceSchedule {
    let schedule_list = attrs
        .blocks("schedule")
        .into_iter()
        .map(|item| ScheduleItem {
            start_day: item.string("start_day"),
            start_time: item.string("start_time"),
            stop_day: item.string("stop_day"),
            stop_time: item.string("stop_time"),
        })
        .collect();

    StartStopManagedInstanceSchedule {
        properties: StartStopScheduleProperties {
            description: attrs.str("description").map(str::to_string),
            time_zone_id: attrs.str("timezone_id").map(str::to_string),
            schedule_list,
            ..Default::default()
        },
        ..Default::default()
    }
}

impl ManagedInstanceStartStopScheduleResource {
    async fn put(
        &self,
        ctx: &ProviderContext,
        attrs: &Attributes,
        create: bool,
    ) -> ProviderResult<String> {
        let a = Attrs::new(attrs);
        let instance =
            ManagedInstanceId::parse(a.require("managed_instance_id")?).map_err(parse_error)?;
        let id = instance.start_stop_schedule(SCHEDULE_NAME);

        let _lock = ctx.locks.by_id(&instance.id()).await;
        let client = ctx.resource_client::<StartStopManagedInstanceSchedule>(API_VERSION);
        if create {
            ensure_absent(&client, &id.id()).await?;
        }

        let action = if create { "creating" } else { "updating" };
        client
            .create_or_update(&id.id(), &expand(a))
            .await
            .map_err(|e| api_error(format!("{} {}", action, id), e))?;
        Ok(id.id())
    }
}

#[async_trait]
impl AzureResource for ManagedInstanceStartStopScheduleResource {
    fn resource_type(&self) -> &'static str {
        "mssql_managed_instance_start_stop_schedule"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("Start and stop times for a SQL Managed Instance")
            .attribute(
                AttributeSchema::new("managed_instance_id", id_type::<ManagedInstanceId>())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(
                AttributeSchema::new("timezone_id", AttributeType::String)
                    .with_default(Value::string("UTC")),
            )
            .attribute(
                AttributeSchema::new("schedule", schedule_block())
                    .required()
                    .min_items(1),
            )
            .attribute(AttributeSchema::new("next_execution_time", AttributeType::String).read_only())
            .attribute(AttributeSchema::new("next_run_action", AttributeType::String).read_only())
    }

    fn validate_id(&self, identifier: &str) -> Result<(), String> {
        ManagedInstanceStartStopScheduleId::validate(identifier)
    }

    async fn create(&self, ctx: &ProviderContext, attrs: &Attributes) -> ProviderResult<String> {
        self.put(ctx, attrs, true).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        identifier: &str,
        _prior: Option<&Attributes>,
    ) -> ProviderResult<Option<Attributes>> {
        let id = ManagedInstanceStartStopScheduleId::parse(identifier).map_err(parse_error)?;
        let client = ctx.resource_client::<StartStopManagedInstanceSchedule>(API_VERSION);
        let Some(schedule) = get_existing(&client, &id.id(), &id).await? else {
            return Ok(None);
        };

        let props = schedule.properties;
        let items = props
            .schedule_list
            .into_iter()
            .map(|item| {
                let mut block = Attributes::new();
                set(&mut block, "start_day", item.start_day);
                set(&mut block, "start_time", item.start_time);
                set(&mut block, "stop_day", item.stop_day);
                set(&mut block, "stop_time", item.stop_time);
                block
            })
            .collect();

        let mut out = Attributes::new();
        set(&mut out, "managed_instance_id", id.managed_instance_id().id());
        set(&mut out, "description", props.description.unwrap_or_default());
        set(&mut out, "timezone_id", props.time_zone_id.unwrap_or_default());
        out.insert("schedule".to_string(), blocks(items));
        set(
            &mut out,
            "next_execution_time",
            props.next_execution_time.unwrap_or_default(),
        );
        set(
            &mut out,
            "next_run_action",
            props.next_run_action.unwrap_or_default(),
        );
        Ok(Some(out))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _identifier: &str,
        _from: &Attributes,
        to: &Attributes,
    ) -> ProviderResult<()> {
        self.put(ctx, to, false).await.map(|_| ())
    }

    async fn delete(&self, ctx: &ProviderContext, identifier: &str) -> ProviderResult<()> {
        let id = ManagedInstanceStartStopScheduleId::parse(identifier).map_err(parse_error)?;
        let _lock = ctx.locks.by_id(&id.managed_instance_id().id()).await;
        let client = ctx.resource_client::<StartStopManagedInstanceSchedule>(API_VERSION);
        match client.delete(&id.id()).await {
            Err(e) if !e.was_not_found() => Err(api_error(format!("deleting {}", id), e)),
            _ => Ok(()),
        }
    }
}
