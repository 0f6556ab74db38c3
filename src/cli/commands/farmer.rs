//! Farmer command implementation.

use crate::cli::{FarmerAction, Output};
use crate::config::Settings;
use crate::farmer::{
    FarmerDataSource, Field, IrrigationLog, IrrigationStatus, NewFarmer, NewField, NewIrrigation,
    SqliteFarmerStore, TriggerType,
};
use anyhow::Result;

/// Run a farmer subcommand against the farmer database.
pub async fn run_farmer(action: FarmerAction, settings: &Settings) -> Result<()> {
    let store = SqliteFarmerStore::new(&settings.farmer_db_path())?;

    match action {
        FarmerAction::Add {
            name,
            id,
            phone,
            location,
        } => {
            let profile = store.add_farmer(NewFarmer {
                id,
                name,
                phone,
                location,
            })?;
            Output::success(&format!("Registered {} ({})", profile.name, profile.id));
        }

        FarmerAction::Field {
            user,
            name,
            crop,
            area,
            humidity,
            min,
            max,
            duration,
            manual,
        } => {
            let field = store.add_field(NewField {
                user_id: user,
                name,
                crop,
                area,
                current_humidity: humidity,
                threshold_min: min,
                threshold_max: max,
                auto_irrigation: !manual,
                irrigation_duration: duration,
            })?;
            Output::success(&format!("Added field {} (id {})", field.name, field.id));
        }

        FarmerAction::Irrigate {
            field_id,
            humidity,
            manual,
        } => {
            let field = store
                .get_field(field_id)?
                .ok_or_else(|| anyhow::anyhow!("Field {} not found", field_id))?;

            match manual {
                Some(minutes) => {
                    let run = store.log_irrigation(NewIrrigation {
                        user_id: field.user_id.clone(),
                        field: field.name.clone(),
                        crop: field.crop.clone(),
                        trigger_type: TriggerType::Manual,
                        humidity,
                        duration: minutes,
                        status: IrrigationStatus::Completed,
                    })?;
                    Output::success(&format!("Logged manual run on {}", run.field));
                }
                None => {
                    let update = store.update_humidity(field_id, humidity)?;
                    Output::success(&format!(
                        "{} humidity is now {}%",
                        update.field.name, update.field.current_humidity
                    ));
                    match update.irrigation {
                        Some(run) => Output::info(&format!(
                            "Below {}%: irrigated for {} minutes",
                            update.field.threshold_min, run.duration
                        )),
                        None => Output::kv("Irrigation", "not needed"),
                    }
                }
            }
        }

        FarmerAction::Show { user } => {
            let context = store.farmer_context(&user, settings.farmer.history_limit).await?;
            let profile = &context.profile;

            Output::header(&profile.name);
            Output::kv("Id", &profile.id);
            if let Some(phone) = &profile.phone {
                Output::kv("Phone", phone);
            }
            if let Some(location) = &profile.location {
                Output::kv("Location", location);
            }

            Output::header("Fields");
            if context.fields.is_empty() {
                Output::list_item("none");
            }
            for field in &context.fields {
                Output::list_item(&describe_field(field));
            }

            Output::header("Recent irrigation");
            if context.irrigation_history.is_empty() {
                Output::list_item("none");
            }
            for run in &context.irrigation_history {
                Output::list_item(&describe_run(run));
            }
        }
    }

    Ok(())
}

fn describe_field(field: &Field) -> String {
    let mut line = format!("[{}] {}", field.id, field.name);
    if let Some(crop) = &field.crop {
        line.push_str(&format!(" ({})", crop));
    }
    line.push_str(&format!(
        ": {}% humidity, range {}-{}%, {}",
        field.current_humidity,
        field.threshold_min,
        field.threshold_max,
        if field.auto_irrigation { "auto" } else { "manual" }
    ));
    line
}

fn describe_run(run: &IrrigationLog) -> String {
    format!(
        "{} {} {} min at {}% ({}, {})",
        run.timestamp.format("%Y-%m-%d %H:%M"),
        run.field,
        run.duration,
        run.humidity,
        run.trigger_type,
        run.status
    )
}
