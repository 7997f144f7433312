//! Secure Kit - Android JNI Bindings
//!
//! Exposes the Secure Kit API to Kotlin/Java via JNI. Fallible calls return
//! `null` / `false`; the error code of the last call on the current thread
//! is read back with `lastErrorCode()` (0 after a success).

#![cfg(feature = "android")]

use std::cell::Cell;

use jni::objects::{JByteArray, JClass, JString};
use jni::sys::{jboolean, jbyteArray, jint, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use parking_lot::RwLock;

use crate::{ErrorKind, JailbreakDetector, KitConfig, KitError, KitResult, SecureStore};

// Process-wide instance for the Java side
static STORE: RwLock<Option<SecureStore>> = parking_lot::const_rwlock(None);

thread_local! {
    static LAST_ERROR: Cell<i32> = Cell::new(0);
}

fn set_last_error(code: i32) {
    LAST_ERROR.with(|c| c.set(code));
}

fn record<T>(result: KitResult<T>) -> Option<T> {
    match result {
        Ok(value) => {
            set_last_error(0);
            Some(value)
        }
        Err(e) => {
            log::debug!("jni call failed ({}): {}", e.kind().as_str(), e);
            set_last_error(e.code());
            None
        }
    }
}

fn with_store<T>(f: impl FnOnce(&SecureStore) -> KitResult<T>) -> KitResult<T> {
    let guard = STORE.read();
    match guard.as_ref() {
        Some(store) => f(store),
        None => Err(KitError::Key("secure store not initialized".into())),
    }
}

/// Never fails; falls back to the default detector before `init`
fn jailbreak_status() -> bool {
    set_last_error(0);
    match STORE.read().as_ref() {
        Some(store) => store.is_jailbreak(),
        None => JailbreakDetector::default().is_jailbroken(),
    }
}

fn read_string(env: &mut JNIEnv, value: &JString) -> KitResult<String> {
    env.get_string(value)
        .map(Into::into)
        .map_err(|e| KitError::InvalidParameter(format!("string argument: {}", e)))
}

fn read_bytes(env: &mut JNIEnv, value: &JByteArray) -> KitResult<Vec<u8>> {
    env.convert_byte_array(value)
        .map_err(|e| KitError::InvalidParameter(format!("byte[] argument: {}", e)))
}

fn return_string(env: &mut JNIEnv, result: KitResult<String>) -> jstring {
    match record(result) {
        Some(s) => match env.new_string(s) {
            Ok(js) => js.into_raw(),
            Err(_) => {
                set_last_error(ErrorKind::Unknown.code());
                std::ptr::null_mut()
            }
        },
        None => std::ptr::null_mut(),
    }
}

fn return_bytes(env: &mut JNIEnv, result: KitResult<Vec<u8>>) -> jbyteArray {
    match record(result) {
        Some(data) => match env.byte_array_from_slice(&data) {
            Ok(arr) => arr.into_raw(),
            Err(_) => {
                set_last_error(ErrorKind::Unknown.code());
                std::ptr::null_mut()
            }
        },
        None => std::ptr::null_mut(),
    }
}

fn return_bool(result: KitResult<()>) -> jboolean {
    match record(result) {
        Some(()) => JNI_TRUE,
        None => JNI_FALSE,
    }
}

/// Initialize from a JSON `KitConfig`
#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_init(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jboolean {
    let result = read_string(&mut env, &config_json).and_then(|json| {
        let config: KitConfig = serde_json::from_str(&json)
            .map_err(|e| KitError::InvalidParameter(format!("config: {}", e)))?;
        let store = SecureStore::open(config)?;
        *STORE.write() = Some(store);
        Ok(())
    });
    return_bool(result)
}

/// Error code of the last call on this thread
#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_lastErrorCode(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    LAST_ERROR.with(|c| c.get())
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_sdkVersion(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    return_string(&mut env, Ok(crate::VERSION.to_string()))
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_isJailbreak(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    if jailbreak_status() {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TRANSPORT
// ═══════════════════════════════════════════════════════════════════════════

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_encryptStringToServer(
    mut env: JNIEnv,
    _class: JClass,
    plaintext: JString,
) -> jstring {
    let result = read_string(&mut env, &plaintext)
        .and_then(|p| with_store(|store| store.encrypt_string_to_server(&p)));
    return_string(&mut env, result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_decryptStringFromServer(
    mut env: JNIEnv,
    _class: JClass,
    envelope: JString,
) -> jstring {
    let result = read_string(&mut env, &envelope)
        .and_then(|e| with_store(|store| store.decrypt_string_from_server(&e)));
    return_string(&mut env, result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_encryptBinaryToServer(
    mut env: JNIEnv,
    _class: JClass,
    plaintext: JByteArray,
) -> jstring {
    let result = read_bytes(&mut env, &plaintext)
        .and_then(|p| with_store(|store| store.encrypt_binary_to_server(&p)));
    return_string(&mut env, result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_decryptBinaryFromServer(
    mut env: JNIEnv,
    _class: JClass,
    envelope: JString,
) -> jbyteArray {
    let result = read_string(&mut env, &envelope)
        .and_then(|e| with_store(|store| store.decrypt_binary_from_server(&e)));
    return_bytes(&mut env, result)
}

// ═══════════════════════════════════════════════════════════════════════════
// LOCAL STORE
// ═══════════════════════════════════════════════════════════════════════════

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_putString(
    mut env: JNIEnv,
    _class: JClass,
    value: JString,
    key: JString,
) -> jboolean {
    let result = read_string(&mut env, &value).and_then(|v| {
        let k = read_string(&mut env, &key)?;
        with_store(|store| store.put_string(&v, &k))
    });
    return_bool(result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_putBinary(
    mut env: JNIEnv,
    _class: JClass,
    value: JByteArray,
    key: JString,
) -> jboolean {
    let result = read_bytes(&mut env, &value).and_then(|v| {
        let k = read_string(&mut env, &key)?;
        with_store(|store| store.put_binary(&v, &k))
    });
    return_bool(result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_getString(
    mut env: JNIEnv,
    _class: JClass,
    key: JString,
) -> jstring {
    let result = read_string(&mut env, &key).and_then(|k| with_store(|store| store.get_string(&k)));
    return_string(&mut env, result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_getBinary(
    mut env: JNIEnv,
    _class: JClass,
    key: JString,
) -> jbyteArray {
    let result = read_string(&mut env, &key).and_then(|k| with_store(|store| store.get_binary(&k)));
    return_bytes(&mut env, result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_updateString(
    mut env: JNIEnv,
    _class: JClass,
    value: JString,
    key: JString,
) -> jboolean {
    let result = read_string(&mut env, &value).and_then(|v| {
        let k = read_string(&mut env, &key)?;
        with_store(|store| store.update_string(&v, &k))
    });
    return_bool(result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_updateBinary(
    mut env: JNIEnv,
    _class: JClass,
    value: JByteArray,
    key: JString,
) -> jboolean {
    let result = read_bytes(&mut env, &value).and_then(|v| {
        let k = read_string(&mut env, &key)?;
        with_store(|store| store.update_binary(&v, &k))
    });
    return_bool(result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_removeString(
    mut env: JNIEnv,
    _class: JClass,
    key: JString,
) -> jboolean {
    let result = read_string(&mut env, &key).and_then(|k| with_store(|store| store.remove_string(&k)));
    return_bool(result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_removeBinary(
    mut env: JNIEnv,
    _class: JClass,
    key: JString,
) -> jboolean {
    let result = read_string(&mut env, &key).and_then(|k| with_store(|store| store.remove_binary(&k)));
    return_bool(result)
}

// ═══════════════════════════════════════════════════════════════════════════
// WHITE-BOX
// ═══════════════════════════════════════════════════════════════════════════

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_wbEncryptString(
    mut env: JNIEnv,
    _class: JClass,
    plaintext: JString,
) -> jstring {
    let result = read_string(&mut env, &plaintext).and_then(|p| with_store(|store| store.wb_encrypt_string(&p)));
    return_string(&mut env, result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_wbEncryptBinary(
    mut env: JNIEnv,
    _class: JClass,
    plaintext: JByteArray,
) -> jstring {
    let result = read_bytes(&mut env, &plaintext).and_then(|p| with_store(|store| store.wb_encrypt_binary(&p)));
    return_string(&mut env, result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_wbDecryptString(
    mut env: JNIEnv,
    _class: JClass,
    envelope: JString,
) -> jstring {
    let result = read_string(&mut env, &envelope).and_then(|e| with_store(|store| store.wb_decrypt_string(&e)));
    return_string(&mut env, result)
}

#[no_mangle]
pub extern "system" fn Java_dev_securekit_NativeSecureStore_wbDecryptBinary(
    mut env: JNIEnv,
    _class: JClass,
    envelope: JString,
) -> jbyteArray {
    let result = read_string(&mut env, &envelope).and_then(|e| with_store(|store| store.wb_decrypt_binary(&e)));
    return_bytes(&mut env, result)
}
