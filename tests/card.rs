mod common;

use std::time::Duration;

use ble_ccid::{
    constants::CONTROL_CODE_ESCAPE, types::message::MessageType, Card, Config, Context, Error,
    PowerSelect, Protocol, ProtocolParameters, Reader, Slot,
};
use common::*;

const ATR: &[u8] = &[0x3B, 0x6E, 0x00, 0x00, 0x80, 0x31, 0x80, 0x66, 0xB0, 0x84, 0x12, 0x01, 0x6E, 0x01, 0x83, 0x00, 0x90, 0x00];

fn timeout() -> Context {
    Context::with_timeout(Duration::from_secs(5))
}

fn types(sim: &SimulatedReader) -> Vec<MessageType> {
    sim.received().iter().map(|m| m.message_type).collect()
}

#[test]
fn contactless_connect_power_cycles_picc() {
    let sim = SimulatedReader::new(23);
    sim.respond_with(card_responder(ATR));
    let reader = Reader::open(sim.clone(), Config::default()).unwrap();

    let card = Card::connect(&reader, Protocol::Contactless, &timeout()).unwrap();
    assert_eq!(card.slot(), Slot::Picc);
    assert_eq!(card.atr(), ATR);
    assert_eq!(card.device_name(), "ACS ACR1552 1S CL Reader PICC 0");
    assert_eq!(types(&sim), vec![MessageType::IccPowerOff, MessageType::IccPowerOn]);
    assert!(sim.received().iter().all(|m| m.slot == Slot::Picc));

    let response = card.exchange(&[0x00, 0xCA, 0x00, 0x00, 0x00], &timeout()).unwrap();
    assert_eq!(response, vec![0x90, 0x00]);
}

#[test]
fn sam_connect_sets_timing_parameters() {
    let sim = SimulatedReader::new(64);
    sim.respond_with(card_responder(ATR));
    let config = Config::default()
        .with_power_select(PowerSelect::V3)
        .with_sam_parameters(ProtocolParameters {
            waiting_integer: 0x45,
            ..Default::default()
        });
    let reader = Reader::open(sim.clone(), config).unwrap();

    let card = Card::connect(&reader, Protocol::T1, &timeout()).unwrap();
    assert_eq!(card.slot(), Slot::Sam);
    assert_eq!(card.protocol(), Protocol::T1);
    assert_eq!(card.device_name(), "ACS ACR1552 1S CL Reader SAM 0");

    let received = sim.received();
    assert_eq!(
        types(&sim),
        vec![
            MessageType::IccPowerOff,
            MessageType::IccPowerOn,
            MessageType::SetParameters
        ]
    );
    assert_eq!(received[1].header[0], PowerSelect::V3 as u8);
    assert_eq!(received[2].header[0], 0x01);
    assert_eq!(received[2].data, vec![0x96, 0x10, 0x00, 0x45, 0x00, 0xFE, 0x00]);

    card.close(&timeout()).unwrap();
    assert_eq!(sim.received().last().unwrap().message_type, MessageType::IccPowerOff);
}

#[test]
fn t0_sam_uses_short_parameter_block() {
    let sim = SimulatedReader::new(64);
    sim.respond_with(card_responder(ATR));
    let reader = Reader::open(sim.clone(), Config::default()).unwrap();

    Card::connect(&reader, Protocol::T0, &timeout()).unwrap();
    let received = sim.received();
    assert_eq!(received[2].header[0], 0x00);
    assert_eq!(received[2].data.len(), 5);
}

#[test]
fn failed_power_on_fails_connect() {
    let sim = SimulatedReader::new(64);
    sim.respond_with(|command| match command.message_type {
        MessageType::IccPowerOff => vec![slot_status(command, 0x01, 0x00, 0x00)],
        _ => vec![slot_status(command, 0x42, 0xFE, 0x00)],
    });
    let reader = Reader::open(sim.clone(), Config::default()).unwrap();

    assert!(Card::connect(&reader, Protocol::Contactless, &timeout()).is_err());
}

#[test]
fn control_passes_escape_through() {
    let sim = SimulatedReader::new(64);
    sim.respond_with(card_responder(ATR));
    let reader = Reader::open(sim.clone(), Config::default()).unwrap();
    let card = Card::connect(&reader, Protocol::Contactless, &timeout()).unwrap();

    let echoed = card
        .control(CONTROL_CODE_ESCAPE, &[0xE0, 0x00, 0x00, 0x20, 0x00], &timeout())
        .unwrap();
    assert_eq!(echoed, vec![0x00, 0x20, 0x00, 0x00, 0xE0]);
    assert_eq!(sim.received().last().unwrap().message_type, MessageType::Escape);

    let before = sim.received().len();
    assert!(matches!(
        card.control(42, &[0x00], &timeout()),
        Err(Error::UnsupportedControl(42))
    ));
    assert_eq!(sim.received().len(), before);
}

#[test]
fn reconnect_refreshes_atr() {
    let sim = SimulatedReader::new(64);
    sim.respond_with(card_responder(ATR));
    let reader = Reader::open(sim.clone(), Config::default()).unwrap();
    let mut card = Card::connect(&reader, Protocol::Contactless, &timeout()).unwrap();

    sim.respond_with(card_responder(&[0x3B, 0x80, 0x80, 0x01, 0x01]));
    card.reconnect(&timeout()).unwrap();
    assert_eq!(card.atr(), &[0x3B, 0x80, 0x80, 0x01, 0x01]);
}
