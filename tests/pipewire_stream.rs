//! `PipeWire` stream integration tests
//!
//! Feed recorded `pw-dump` and `pw-metadata` output through the public
//! session API and check the resulting session events. No `PipeWire` daemon
//! or tools are needed.

use pretty_assertions::assert_eq;
use wp_notifyd::pipewire::{PwMessage, PwObject, PwSession, parse_metadata_line};
use wp_notifyd::session::{
    Component, DeviceQuery, DeviceRole, NO_DEVICE, Session, SessionEvent,
};

const INITIAL_DUMP: &str = r#"[
  {
    "id": 31,
    "type": "PipeWire:Interface:Metadata",
    "version": 3,
    "permissions": ["r", "w", "x", "m"],
    "props": {"metadata.name": "default", "object.serial": 31},
    "metadata": [
      {"subject": 0, "key": "default.audio.sink", "type": "Spa:String:JSON", "value": {"name": "alsa_output.usb-headset"}}
    ]
  },
  {
    "id": 44,
    "type": "PipeWire:Interface:Node",
    "version": 3,
    "permissions": ["r", "w", "x", "m"],
    "info": {
      "max-input-ports": 0,
      "state": "suspended",
      "props": {
        "node.name": "alsa_output.usb-headset",
        "node.description": "USB Headset Analog Stereo",
        "media.class": "Audio/Sink",
        "object.serial": 51
      },
      "params": {
        "EnumFormat": [],
        "Props": [
          {"volume": 1.0, "mute": false, "channelVolumes": [0.216, 0.216], "channelMap": ["FL", "FR"], "softMute": false},
          {"params": ["audio.channels", 2]}
        ]
      }
    }
  },
  {
    "id": 45,
    "type": "PipeWire:Interface:Node",
    "version": 3,
    "permissions": ["r", "w", "x", "m"],
    "info": {
      "props": {
        "node.name": "alsa_input.usb-headset",
        "node.nick": "Headset Mic",
        "media.class": "Audio/Source"
      },
      "params": {
        "Props": [{"volume": 1.0, "mute": false, "channelVolumes": [0.512]}]
      }
    }
  },
  {
    "id": 46,
    "type": "PipeWire:Interface:Link",
    "info": {"output-node-id": 44, "input-node-id": 50, "state": "active"}
  }
]"#;

fn metadata(line: &str) -> PwMessage {
    PwMessage::Metadata(parse_metadata_line(line).expect("valid pw-metadata line"))
}

fn objects(json: &str) -> PwMessage {
    PwMessage::Objects(serde_json::from_str::<Vec<PwObject>>(json).expect("valid pw-dump batch"))
}

/// Session in the state the bootstrap leaves it in, minus the watch
fn bootstrapped() -> PwSession {
    let (mut session, _messages) = PwSession::new();
    for role in DeviceRole::ALL {
        session.declare_interest(role);
    }
    for component in [Component::DefaultNodes, Component::Mixer] {
        session.absorb(PwMessage::Loaded { component, result: Ok(()) });
        session.absorb(PwMessage::Activated { component, result: Ok(()) });
    }
    session
}

#[test]
fn initial_dump_completes_watch_and_resolves_defaults() {
    let mut session = bootstrapped();
    session.install_watch();

    let events = session.absorb(objects(INITIAL_DUMP));
    assert_eq!(events, vec![SessionEvent::WatchInstalled { result: Ok(()) }]);

    session.absorb(metadata(
        r#"update: id:0 key:'default.audio.sink' value:'{"name":"alsa_output.usb-headset"}' type:'Spa:String:JSON'"#,
    ));
    session.absorb(metadata(
        r#"update: id:0 key:'default.audio.source' value:'{"name":"alsa_input.usb-headset"}' type:'Spa:String:JSON'"#,
    ));

    assert_eq!(session.default_device_id(DeviceRole::Output), 44);
    assert_eq!(session.default_device_id(DeviceRole::Input), 45);

    let headset = session.query_device(44).expect("headset is known");
    assert_eq!(headset.name.as_deref(), Some("USB Headset Analog Stereo"));
    assert!((headset.volume - 0.6).abs() < 1e-9);

    let mic = session.query_device(45).expect("mic is known");
    assert_eq!(mic.name.as_deref(), Some("Headset Mic"));
    assert!((mic.volume - 0.8).abs() < 1e-9);
}

#[test]
fn default_switch_and_removal_after_subscribe() {
    let mut session = bootstrapped();
    session.absorb(objects(INITIAL_DUMP));
    session.absorb(metadata(
        r#"update: id:0 key:'default.audio.sink' value:'{"name":"alsa_output.usb-headset"}' type:'Spa:String:JSON'"#,
    ));
    session.subscribe();

    // Another metadata subject is not about defaults
    let events = session.absorb(metadata(
        "update: id:44 key:'target.object' value:'51' type:'Spa:Id'",
    ));
    assert!(events.is_empty());

    let events = session.absorb(metadata(
        r#"update: id:0 key:'default.audio.source' value:'{"name":"alsa_input.usb-headset"}' type:'Spa:String:JSON'"#,
    ));
    assert_eq!(
        events,
        vec![SessionEvent::DefaultChanged { role: DeviceRole::Input, id: 45 }]
    );

    let events = session.absorb(objects(r#"[{"id": 44, "info": null}]"#));
    assert_eq!(
        events,
        vec![SessionEvent::DefaultChanged { role: DeviceRole::Output, id: NO_DEVICE }]
    );
}

#[test]
fn volume_change_reports_property_change() {
    let mut session = bootstrapped();
    session.absorb(objects(INITIAL_DUMP));
    session.subscribe();

    let events = session.absorb(objects(
        r#"[{
            "id": 45,
            "type": "PipeWire:Interface:Node",
            "info": {
                "change-mask": ["params"],
                "params": {"Props": [{"mute": true, "channelVolumes": [0.512]}]}
            }
        }]"#,
    ));

    assert_eq!(events, vec![SessionEvent::PropertyChanged { id: 45 }]);
    let mic = session.query_device(45).expect("mic is known");
    assert!(mic.mute);
    assert_eq!(mic.name.as_deref(), Some("Headset Mic"));
}
