use rdev::Key as HostKey;

use crate::state::Key;

// Two layouts map onto the keypad:
//
// 1 2 3 4    7 8 9 0        1 2 3 C
// Q W E R    U I O P  --->  4 5 6 D
// A S D F    J K L ;        7 8 9 E
// Z X C V    N M , .        A 0 B F
pub fn map_key(key: HostKey) -> Option<Key> {
    let key = match key {
        HostKey::Num1 | HostKey::Num7 => Key::Key1,
        HostKey::Num2 | HostKey::Num8 => Key::Key2,
        HostKey::Num3 | HostKey::Num9 => Key::Key3,
        HostKey::Num4 | HostKey::Num0 => Key::KeyC,
        HostKey::KeyQ | HostKey::KeyU => Key::Key4,
        HostKey::KeyW | HostKey::KeyI => Key::Key5,
        HostKey::KeyE | HostKey::KeyO => Key::Key6,
        HostKey::KeyR | HostKey::KeyP => Key::KeyD,
        HostKey::KeyA | HostKey::KeyJ => Key::Key7,
        HostKey::KeyS | HostKey::KeyK => Key::Key8,
        HostKey::KeyD | HostKey::KeyL => Key::Key9,
        HostKey::KeyF | HostKey::SemiColon => Key::KeyE,
        HostKey::KeyZ | HostKey::KeyN => Key::KeyA,
        HostKey::KeyX | HostKey::KeyM => Key::Key0,
        HostKey::KeyC | HostKey::Comma => Key::KeyB,
        HostKey::KeyV | HostKey::Dot => Key::KeyF,
        _ => return None,
    };
    Some(key)
}

pub const KEYPAD_LEGEND: &str = "1 2 3 4 / 7 8 9 0    →    1 2 3 C\n\
Q W E R / U I O P    →    4 5 6 D\n\
A S D F / J K L ;    →    7 8 9 E\n\
Z X C V / N M , .    →    A 0 B F";
