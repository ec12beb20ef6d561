use huddle_core::phone::{PhoneNormalizer, DEFAULT_REGION};

use super::CommandResult;

pub fn run(text: &str, region: Option<&str>) -> CommandResult {
    let region = region.unwrap_or(DEFAULT_REGION);
    let Some(normalizer) = PhoneNormalizer::for_region(region) else {
        return CommandResult::failure(
            "phone",
            "unsupported_region",
            format!("no phone metadata for region `{region}`"),
            2,
        );
    };

    if let Err(rejection) = normalizer.validate_for_linking(text) {
        return CommandResult::failure(
            "phone",
            "invalid_contact",
            format!("{rejection}: {}", rejection.user_message()),
            3,
        );
    }

    match normalizer.info(text) {
        Some(info) => {
            let message = format!("normalized to {}", info.e164);
            CommandResult::success_with_data("phone", message, info)
        }
        None => CommandResult::failure("phone", "invalid_contact", "number could not be parsed", 3),
    }
}
