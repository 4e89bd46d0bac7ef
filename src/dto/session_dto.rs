use serde::Deserialize;
use validator::Validate;

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionReq {
    #[validate(length(
        min = 1,
        max = 512,
        message = "deviceToken must be between 1 and 512 characters"
    ))]
    pub device_token: Option<String>,
}
