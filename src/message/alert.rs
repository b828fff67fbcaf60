use nom::IResult;

use crate::buffer::Buf;
use crate::types::{AlertDescription, AlertLevel};

/// Alert message: `level(1) || description(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    /// Alert severity.
    pub level: AlertLevel,
    /// What the alert is about.
    pub description: AlertDescription,
}

impl Alert {
    /// Assemble an Alert.
    pub fn new(level: AlertLevel, description: AlertDescription) -> Self {
        Alert { level, description }
    }

    /// Parse an Alert body.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Alert> {
        let (input, level) = AlertLevel::parse(input)?;
        let (input, description) = AlertDescription::parse(input)?;
        Ok((input, Alert { level, description }))
    }

    /// Serialize this Alert body.
    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.level.as_u8());
        output.push(self.description.as_u8());
    }
}
