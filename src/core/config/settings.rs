use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_positive_u64, parse_role,
};
use super::types::{
    ApiSettings, BaseUrl, ConfigError, RuntimeSettings, Settings, TelemetrySettings, UserSettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("KAMBAZ_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("KAMBAZ_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let base_url = BaseUrl::parse(env_or_default("KAMBAZ_API_URL", "http://localhost:4000"))?;
        let timeout_seconds = parse_positive_u64(
            "KAMBAZ_HTTP_TIMEOUT_SECONDS",
            env_or_default("KAMBAZ_HTTP_TIMEOUT_SECONDS", "30"),
        )?;
        let connect_timeout_seconds = parse_positive_u64(
            "KAMBAZ_HTTP_CONNECT_TIMEOUT_SECONDS",
            env_or_default("KAMBAZ_HTTP_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;
        let session_cookie = env_optional("KAMBAZ_SESSION_COOKIE");

        let user_id = env_optional("KAMBAZ_USER_ID");
        let role = parse_role(env_optional("KAMBAZ_USER_ROLE"))?;
        let course_id = env_optional("KAMBAZ_COURSE_ID");

        let log_level = env_or_default("KAMBAZ_LOG_LEVEL", "info");
        let json = env_optional("KAMBAZ_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { base_url, timeout_seconds, connect_timeout_seconds, session_cookie },
            user: UserSettings { user_id, role, course_id },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn user(&self) -> &UserSettings {
        &self.user
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.connect_timeout_seconds > self.api.timeout_seconds {
            return Err(ConfigError::InvalidValue {
                field: "KAMBAZ_HTTP_CONNECT_TIMEOUT_SECONDS",
                value: self.api.connect_timeout_seconds.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.user.user_id.is_none() {
            return Err(ConfigError::MissingValue("KAMBAZ_USER_ID"));
        }

        if self.api.session_cookie.is_none() {
            return Err(ConfigError::MissingValue("KAMBAZ_SESSION_COOKIE"));
        }

        Ok(())
    }
}
