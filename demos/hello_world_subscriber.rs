use netbus::{Message, MessageInfo, Node, NodeOptions, SharedContext};

#[derive(Clone)]
struct HelloWorldType {
    id: u8,
    msg: String,
}

impl Message for HelloWorldType {
    fn type_name() -> &'static str {
        "HelloWorldType"
    }

    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let mut bytes = vec![self.id];
        bytes.extend_from_slice(self.msg.as_bytes());
        Ok(bytes)
    }
}

fn main() {
    let context = SharedContext::process_default();
    let node = Node::new(NodeOptions::default(), context);
    println!("{:?} [S] Created node", std::time::SystemTime::now());

    node.subscribe::<HelloWorldType, _>("HelloWorld", |msg: &HelloWorldType, info: &MessageInfo| {
        println!(
            "{:?} [S] ({}) Data id: {:?} Msg: {:?}",
            std::time::SystemTime::now(),
            info.topic,
            msg.id,
            msg.msg
        );
    })
    .unwrap();
    println!("{:?} [S] Subscribed to topic", std::time::SystemTime::now());

    std::thread::sleep(std::time::Duration::from_secs(10));
}
