//! Typed decoding of coils and registers.

use tracing::warn;

use crate::config::{RegisterClass, ValueType};
use crate::source::RegisterSource;

/// A decoded, unscaled data point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterValue {
    Bool(bool),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
}

impl RegisterValue {
    /// Numeric value used for scaling. Flags map to 1.0 and 0.0.
    pub fn as_f64(&self) -> f64 {
        match *self {
            RegisterValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            RegisterValue::U16(v) => v as f64,
            RegisterValue::I16(v) => v as f64,
            RegisterValue::U32(v) => v as f64,
            RegisterValue::I32(v) => v as f64,
        }
    }
}

/// Compose a 32-bit word from a high and a low register.
pub fn compose_u32(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | (low as u32)
}

/// Read and decode one value.
///
/// `bool` reads a single coil and ignores `class`. 32-bit types issue two
/// independent single-register reads at `address` (high word) and
/// `address + 1` (low word); the value is only produced if both succeed.
///
/// Read failures are logged and yield `None`.
pub async fn decode<S>(
    source: &mut S,
    address: u16,
    value_type: ValueType,
    class: RegisterClass,
) -> Option<RegisterValue>
where
    S: RegisterSource + ?Sized,
{
    match value_type {
        ValueType::Bool => match source.read_coil(address).await {
            Ok(bit) => Some(RegisterValue::Bool(bit)),
            Err(e) => {
                warn!(
                    address,
                    value_type = %value_type.as_str(),
                    error = %e,
                    "Failed to read coil"
                );
                None
            }
        },
        ValueType::Uint16 => read_word(source, value_type, class, address)
            .await
            .map(RegisterValue::U16),
        ValueType::Int16 => read_word(source, value_type, class, address)
            .await
            .map(|raw| RegisterValue::I16(raw as i16)),
        ValueType::Uint32 => read_pair(source, value_type, class, address)
            .await
            .map(RegisterValue::U32),
        ValueType::Int32 => read_pair(source, value_type, class, address)
            .await
            .map(|raw| RegisterValue::I32(raw as i32)),
    }
}

async fn read_word<S>(
    source: &mut S,
    value_type: ValueType,
    class: RegisterClass,
    address: u16,
) -> Option<u16>
where
    S: RegisterSource + ?Sized,
{
    match source.read_register(class, address).await {
        Ok(word) => Some(word),
        Err(e) => {
            warn!(
                address,
                value_type = %value_type.as_str(),
                register_type = %class.as_str(),
                error = %e,
                "Failed to read register"
            );
            None
        }
    }
}

async fn read_pair<S>(
    source: &mut S,
    value_type: ValueType,
    class: RegisterClass,
    address: u16,
) -> Option<u32>
where
    S: RegisterSource + ?Sized,
{
    let Some(low_address) = address.checked_add(1) else {
        warn!(
            address,
            value_type = %value_type.as_str(),
            register_type = %class.as_str(),
            "32-bit value has no room for its low word"
        );
        return None;
    };

    // Both reads are always issued so each request shows up on the wire.
    let high = read_word(source, value_type, class, address).await;
    let low = read_word(source, value_type, class, low_address).await;

    Some(compose_u32(high?, low?))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::mock::{MockRegisterSource, ReadCall};

    /// Log output collected by a test subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    async fn int16_at(source: &mut MockRegisterSource, address: u16) -> Option<RegisterValue> {
        decode(source, address, ValueType::Int16, RegisterClass::Holding).await
    }

    #[tokio::test]
    async fn test_decode_int16_sign() {
        let mut source = MockRegisterSource::new()
            .with_holding(0, 32767)
            .with_holding(1, 32768)
            .with_holding(2, 65535);

        assert_eq!(int16_at(&mut source, 0).await, Some(RegisterValue::I16(32767)));
        assert_eq!(int16_at(&mut source, 1).await, Some(RegisterValue::I16(-32768)));
        assert_eq!(int16_at(&mut source, 2).await, Some(RegisterValue::I16(-1)));
    }

    #[tokio::test]
    async fn test_decode_uint16_keeps_high_values() {
        let mut source = MockRegisterSource::new().with_input(7, 65535);

        let value = decode(&mut source, 7, ValueType::Uint16, RegisterClass::Input).await;

        assert_eq!(value, Some(RegisterValue::U16(65535)));
        assert_eq!(source.calls(), vec![ReadCall::Input(7)]);
    }

    #[tokio::test]
    async fn test_decode_int32_composition() {
        let mut source = MockRegisterSource::new()
            .with_holding(100, 0x7FFF)
            .with_holding(101, 0xFFFF)
            .with_holding(200, 0x8000)
            .with_holding(201, 0x0000);

        let max = decode(&mut source, 100, ValueType::Int32, RegisterClass::Holding).await;
        let min = decode(&mut source, 200, ValueType::Int32, RegisterClass::Holding).await;

        assert_eq!(max, Some(RegisterValue::I32(2147483647)));
        assert_eq!(min, Some(RegisterValue::I32(-2147483648)));
    }

    #[tokio::test]
    async fn test_decode_uint32_high_word_first() {
        let mut source = MockRegisterSource::new()
            .with_input(10, 0x0001)
            .with_input(11, 0x0002);

        let value = decode(&mut source, 10, ValueType::Uint32, RegisterClass::Input).await;

        assert_eq!(value, Some(RegisterValue::U32(0x0001_0002)));
        assert_eq!(source.calls(), vec![ReadCall::Input(10), ReadCall::Input(11)]);
    }

    #[tokio::test]
    async fn test_decode_32bit_fails_when_second_read_fails() {
        let mut source = MockRegisterSource::new()
            .with_holding(10, 0x0001)
            .with_holding(11, 0x0002)
            .failing_at(11);

        let value = decode(&mut source, 10, ValueType::Uint32, RegisterClass::Holding).await;

        assert_eq!(value, None);
        assert_eq!(
            source.calls(),
            vec![ReadCall::Holding(10), ReadCall::Holding(11)]
        );
    }

    #[tokio::test]
    async fn test_decode_32bit_fails_when_first_read_fails() {
        let mut source = MockRegisterSource::new()
            .with_holding(11, 0x0002)
            .failing_at(10);

        let value = decode(&mut source, 10, ValueType::Int32, RegisterClass::Holding).await;

        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_decode_32bit_at_last_address() {
        let mut source = MockRegisterSource::new().with_holding(u16::MAX, 1);

        let value = decode(&mut source, u16::MAX, ValueType::Uint32, RegisterClass::Holding).await;

        assert_eq!(value, None);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_decode_bool_reads_coil() {
        let mut source = MockRegisterSource::new()
            .with_coil(3, true)
            .with_coil(4, false);

        // Register class does not matter for coils.
        let on = decode(&mut source, 3, ValueType::Bool, RegisterClass::Input).await;
        let off = decode(&mut source, 4, ValueType::Bool, RegisterClass::Holding).await;

        assert_eq!(on, Some(RegisterValue::Bool(true)));
        assert_eq!(off, Some(RegisterValue::Bool(false)));
        assert_eq!(source.calls(), vec![ReadCall::Coil(3), ReadCall::Coil(4)]);
    }

    #[tokio::test]
    async fn test_decode_failure_yields_none() {
        let mut source = MockRegisterSource::new().failing_all();

        for value_type in [
            ValueType::Bool,
            ValueType::Uint16,
            ValueType::Int16,
            ValueType::Uint32,
            ValueType::Int32,
        ] {
            let value = decode(&mut source, 0, value_type, RegisterClass::Holding).await;
            assert_eq!(value, None, "{} should not decode", value_type.as_str());
        }
    }

    #[tokio::test]
    async fn test_failure_log_names_value_type() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut source = MockRegisterSource::new().failing_all();
        decode(&mut source, 7, ValueType::Int32, RegisterClass::Input).await;
        decode(&mut source, 3, ValueType::Bool, RegisterClass::Holding).await;

        let text = logs.text();
        assert!(text.contains("Failed to read register"));
        assert!(text.contains("address=7"));
        assert!(text.contains("value_type=int32"));
        assert!(text.contains("register_type=input"));
        assert!(text.contains("Failed to read coil"));
        assert!(text.contains("address=3"));
        assert!(text.contains("value_type=bool"));
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(RegisterValue::Bool(true).as_f64(), 1.0);
        assert_eq!(RegisterValue::Bool(false).as_f64(), 0.0);
        assert_eq!(RegisterValue::I16(-5).as_f64(), -5.0);
        assert_eq!(RegisterValue::U32(4294967295).as_f64(), 4294967295.0);
        assert_eq!(RegisterValue::I32(i32::MIN).as_f64(), -2147483648.0);
    }

    #[test]
    fn test_compose_u32() {
        assert_eq!(compose_u32(0x7FFF, 0xFFFF), 0x7FFF_FFFF);
        assert_eq!(compose_u32(0, 1), 1);
    }
}
