use crate::node::types::{OutputFrame, MAX_OUTPUTS};

pub const SYNC_BYTE: u8 = 0xAA;
pub const MAX_MSG_SIZE: usize = 244;

//header (node_id, armed, count) + one f32 per channel
pub const OUTPUT_HEADER_SIZE: usize = 3;
pub const OUTPUT_PAYLOAD_MAX: usize = OUTPUT_HEADER_SIZE + MAX_OUTPUTS * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType{
    Output = 0x20,
    Arm = 0x21,
}

impl MsgType{
    pub fn from_u8(val: u8) -> Option<Self>{
        match val{
            0x20 => Some(MsgType::Output),
            0x21 => Some(MsgType::Arm),
            _ => None,
        }
    }
}

pub fn calculate_checksum(data: &[u8]) -> u8{
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

//frame format: [SYNC][TYPE][LEN][PAYLOAD...][CHECKSUM]
//checksum covers TYPE, LEN and PAYLOAD
pub fn encode_frame(msg_type: MsgType, payload: &[u8]) -> Option<Vec<u8>>{
    if payload.len() > MAX_MSG_SIZE{
        return None;
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.push(SYNC_BYTE);
    frame.push(msg_type as u8);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);

    let checksum = calculate_checksum(&frame[1..]);
    frame.push(checksum);
    Some(frame)
}

//parse one frame from the front of `buf`; returns the type, payload and bytes consumed
pub fn decode_frame(buf: &[u8]) -> Option<(MsgType, &[u8], usize)>{
    if buf.len() < 4 || buf[0] != SYNC_BYTE{
        return None;
    }
    let len = buf[2] as usize;
    if len > MAX_MSG_SIZE || buf.len() < 4 + len{
        return None;
    }
    if buf[3 + len] != calculate_checksum(&buf[1..3 + len]){
        return None;
    }
    let msg_type = MsgType::from_u8(buf[1])?;
    Some((msg_type, &buf[3..3 + len], 4 + len))
}

pub fn output_payload(frame: &OutputFrame) -> Vec<u8>{
    let values = frame.outputs.values();
    let mut payload = Vec::with_capacity(OUTPUT_HEADER_SIZE + values.len() * 4);
    payload.push(frame.node_id.get());
    payload.push(frame.armed as u8);
    payload.push(values.len() as u8);
    for v in values{
        payload.extend_from_slice(&v.to_le_bytes());
    }
    payload
}

pub fn arm_payload(node_id: u8, armed: bool) -> [u8; 2]{
    [node_id, armed as u8]
}

#[cfg(test)]
mod tests{
    use super::*;
    use crate::node::types::{NodeId, OutputVector};

    #[test]
    fn test_msg_type_conversion(){
        assert_eq!(MsgType::from_u8(0x20), Some(MsgType::Output));
        assert_eq!(MsgType::from_u8(0x21), Some(MsgType::Arm));
        assert_eq!(MsgType::from_u8(0xFF), None);
    }

    #[test]
    fn test_output_frame_layout(){
        let mut outputs = OutputVector::default();
        outputs.output[0] = 0.5;
        outputs.output[1] = -1.0;
        outputs.noutputs = 2;
        let frame = OutputFrame{ node_id: NodeId::new(42).unwrap(), outputs, armed: true };

        let payload = output_payload(&frame);
        assert_eq!(payload.len(), OUTPUT_HEADER_SIZE + 8);
        assert_eq!(&payload[..3], &[42, 1, 2]);
        assert_eq!(&payload[3..7], &0.5f32.to_le_bytes());

        let bytes = encode_frame(MsgType::Output, &payload).unwrap();
        assert_eq!(bytes[0], SYNC_BYTE);
        assert_eq!(bytes[2] as usize, payload.len());

        let (msg_type, decoded, used) = decode_frame(&bytes).unwrap();
        assert_eq!(msg_type, MsgType::Output);
        assert_eq!(decoded, payload.as_slice());
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn test_corrupt_checksum_rejected(){
        let mut bytes = encode_frame(MsgType::Arm, &arm_payload(3, true)).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(decode_frame(&bytes).is_none());
    }

    #[test]
    fn test_oversized_payload_rejected(){
        assert!(encode_frame(MsgType::Output, &[0u8; MAX_MSG_SIZE + 1]).is_none());
        assert!(OUTPUT_PAYLOAD_MAX <= MAX_MSG_SIZE);
    }
}
